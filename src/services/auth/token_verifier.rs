use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, Validation, errors::ErrorKind};
use serde::Deserialize;
use thiserror::Error;

use crate::config::AuthConfig;
use crate::services::auth::{
    clock::Clock,
    jwks::{KeyCache, KeyLookupError},
};

/// Verification failures. Every variant except `KeysUnavailable` is a client
/// problem; the gate reports all of them as the same 401.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,
    #[error("malformed credential")]
    MalformedCredential,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("credential expired")]
    Expired,
    #[error("invalid claim: {0}")]
    InvalidClaims(&'static str),
    #[error("signing keys unavailable")]
    KeysUnavailable,
}

impl AuthError {
    /// Stable name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential => "MissingCredential",
            Self::MalformedCredential => "MalformedCredential",
            Self::InvalidSignature => "InvalidSignature",
            Self::Expired => "Expired",
            Self::InvalidClaims(_) => "InvalidClaims",
            Self::KeysUnavailable => "KeysUnavailable",
        }
    }
}

/// Claims we read from the provider's access token.
///
/// NOTE:
/// - `aud` may be a string or an array; jsonwebtoken validates it when an audience is configured.
/// - Supabase also puts `email` / `role` here; only `email` is surfaced.
#[derive(Debug, Clone, Deserialize)]
struct AccessTokenClaims {
    iss: String,
    sub: String,
    exp: i64,
    #[serde(default)]
    nbf: Option<i64>,
    #[serde(default)]
    email: Option<String>,
}

/// Identity proven by a credential. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject_id: String,
    pub expires_at: DateTime<Utc>,
    pub issuer: String,
    pub email: Option<String>,
}

/// Access-token verifier backed by the provider's published key set.
pub struct TokenVerifier {
    keys: Arc<KeyCache>,
    clock: Arc<dyn Clock>,
    issuer: String,
    audience: Option<String>,
    allowed_algorithms: Vec<Algorithm>,
    leeway_seconds: i64,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("allowed_algorithms", &self.allowed_algorithms)
            .field("keys", &self.keys)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig, keys: Arc<KeyCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            keys,
            clock,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            allowed_algorithms: config.allowed_algorithms.clone(),
            leeway_seconds: i64::try_from(config.leeway_seconds).unwrap_or(i64::MAX),
        }
    }

    /// Verify a raw bearer credential.
    ///
    /// Structure and algorithm are checked before any key lookup, so garbage
    /// input never reaches the identity provider.
    pub async fn verify(&self, credential: Option<&str>) -> Result<VerifiedIdentity, AuthError> {
        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        let header =
            jsonwebtoken::decode_header(token).map_err(|_| AuthError::MalformedCredential)?;

        if !self.allowed_algorithms.contains(&header.alg) {
            return Err(AuthError::InvalidSignature);
        }
        let kid = header.kid.ok_or(AuthError::MalformedCredential)?;

        let key = self.keys.key_for(&kid).await.map_err(|err| match err {
            KeyLookupError::UnknownKey(_) => AuthError::InvalidSignature,
            KeyLookupError::Unavailable(_) => AuthError::KeysUnavailable,
        })?;

        let validation = self.validation(header.alg);
        let data = jsonwebtoken::decode::<AccessTokenClaims>(token, &key, &validation)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    AuthError::InvalidSignature
                }
                ErrorKind::InvalidIssuer => AuthError::InvalidClaims("iss"),
                ErrorKind::InvalidAudience => AuthError::InvalidClaims("aud"),
                ErrorKind::MissingRequiredClaim(claim) => {
                    AuthError::InvalidClaims(claim_name(claim))
                }
                _ => AuthError::MalformedCredential,
            })?;

        self.check_time_claims(&data.claims)?;

        let claims = data.claims;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidClaims("sub"));
        }
        let expires_at =
            DateTime::from_timestamp(claims.exp, 0).ok_or(AuthError::InvalidClaims("exp"))?;

        Ok(VerifiedIdentity {
            subject_id: claims.sub,
            expires_at,
            issuer: claims.iss,
            email: claims.email,
        })
    }

    // exp/nbf are checked against the injected clock, not by jsonwebtoken.
    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_issuer(&[self.issuer.as_str()]);

        let mut required: HashSet<String> = ["exp", "sub", "iss"].map(String::from).into();
        match &self.audience {
            Some(aud) => {
                validation.set_audience(&[aud.as_str()]);
                required.insert("aud".to_string());
            }
            None => validation.validate_aud = false,
        }
        validation.required_spec_claims = required;
        validation
    }

    fn check_time_claims(&self, claims: &AccessTokenClaims) -> Result<(), AuthError> {
        let now = self.clock.now().timestamp();

        // valid while now < exp (+ leeway)
        if now >= claims.exp.saturating_add(self.leeway_seconds) {
            return Err(AuthError::Expired);
        }
        if let Some(nbf) = claims.nbf
            && now < nbf.saturating_sub(self.leeway_seconds)
        {
            return Err(AuthError::InvalidClaims("nbf"));
        }
        Ok(())
    }
}

fn claim_name(claim: &str) -> &'static str {
    match claim {
        "aud" => "aud",
        "exp" => "exp",
        "iss" => "iss",
        "sub" => "sub",
        _ => "required",
    }
}
