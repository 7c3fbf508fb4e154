/*
 * Responsibility
 * - Authorization ヘッダから Bearer クレデンシャルを取り出す (ヘッダ抽出のみ、検証はしない)
 * - ヘッダなし → None (= MissingCredential は verifier 側で判定)
 * - 形式不正 (非 UTF-8 / Bearer 以外の scheme / 空トークン) → MalformedCredential
 */
use axum::http::{HeaderMap, header};

use crate::services::auth::AuthError;

pub fn bearer_credential(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| AuthError::MalformedCredential)?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedCredential)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedCredential);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedCredential);
    }
    Ok(Some(token))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn absent_header_is_none() {
        assert!(matches!(bearer_credential(&HeaderMap::new()), Ok(None)));
    }

    #[test]
    fn extracts_token() {
        assert_eq!(bearer_credential(&headers("Bearer abc.def.ghi")).unwrap(), Some("abc.def.ghi"));
        assert_eq!(bearer_credential(&headers("bearer   abc")).unwrap(), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        for value in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer    ", "abc.def.ghi"] {
            assert!(
                matches!(bearer_credential(&headers(value)), Err(AuthError::MalformedCredential)),
                "{value}"
            );
        }
    }
}
