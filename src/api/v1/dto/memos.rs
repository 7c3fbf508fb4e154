/*
 * Responsibility
 * - Memos の request/response DTO
 * - 入力検証 (store を呼ぶ前に handler がここを通す)
 * - 公開 ID は encode 済みの値を返す (内部 ID を漏らさない)
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repos::memo::{Memo, MemoPatch, NewMemo};
use crate::services::id_codec::{IdCodec, IdCodecError};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_BODY_CHARS: usize = 10_000;

/// POST /memos, PUT /memos/{memo_id}
#[derive(Debug, Deserialize)]
pub struct CreateMemoRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: String,
}

/// PUT replaces both fields, so it takes the same shape as create.
pub type ReplaceMemoRequest = CreateMemoRequest;

impl CreateMemoRequest {
    pub fn validate(self) -> Result<NewMemo, &'static str> {
        let title = self.title.ok_or("title is required")?;
        let title = validate_title(&title)?;
        validate_body(&self.body)?;

        Ok(NewMemo {
            title,
            body: self.body,
        })
    }
}

/// PATCH /memos/{memo_id}
#[derive(Debug, Deserialize)]
pub struct PatchMemoRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl PatchMemoRequest {
    pub fn validate(self) -> Result<MemoPatch, &'static str> {
        if self.title.is_none() && self.body.is_none() {
            return Err("at least one of title or body is required");
        }

        let title = match self.title {
            Some(title) => Some(validate_title(&title)?),
            None => None,
        };
        if let Some(body) = &self.body {
            validate_body(body)?;
        }

        Ok(MemoPatch {
            title,
            body: self.body,
        })
    }
}

fn validate_title(title: &str) -> Result<String, &'static str> {
    let title = title.trim();
    if title.is_empty() {
        return Err("title cannot be empty");
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err("title must be at most 200 characters");
    }
    Ok(title.to_string())
}

fn validate_body(body: &str) -> Result<(), &'static str> {
    if body.chars().count() > MAX_BODY_CHARS {
        return Err("body must be at most 10000 characters");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct MemoResponse {
    pub id: String, // encoded
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemoResponse {
    pub fn from_memo(codec: &IdCodec, memo: Memo) -> Result<Self, IdCodecError> {
        Ok(Self {
            id: codec.encode(memo.id)?,
            title: memo.title,
            body: memo.body,
            created_at: memo.created_at,
            updated_at: memo.updated_at,
        })
    }
}
