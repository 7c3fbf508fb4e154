//! Signing key set (JWKS) fetch + cache.
//!
//! - Keys are fetched lazily on first use and kept for `ttl`.
//! - An unknown `kid` forces a refresh, but only when the current set is older
//!   than `min_refresh_interval` (forged kids must not turn into one fetch per request).
//! - Concurrent misses share a single fetch (refresh mutex + re-check), and so
//!   does its failure: tasks queued behind a failed attempt get its error.
//! - A failed fetch is retried once, then surfaced as `JwksError`.
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    DecodingKey,
    jwk::{Jwk, JwkSet},
};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::services::auth::clock::Clock;

#[derive(Debug, Error)]
pub enum JwksError {
    #[error("jwks request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("jwks endpoint returned status {0}")]
    Status(u16),
    #[error("jwks document is invalid: {0}")]
    InvalidDocument(String),
    #[error("jwks refresh failed while waiting on it: {0}")]
    SharedFailure(String),
}

/// Where the key set comes from. The HTTP implementation is the only one used
/// outside of tests.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, JwksError>;
}

#[derive(Debug, Clone)]
pub struct HttpJwksFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpJwksFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, JwksError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self) -> Result<JwkSet, JwksError> {
        let res = self.client.get(&self.url).send().await?;
        if !res.status().is_success() {
            return Err(JwksError::Status(res.status().as_u16()));
        }
        let body = res.bytes().await?;
        serde_json::from_slice::<JwkSet>(&body)
            .map_err(|e| JwksError::InvalidDocument(e.to_string()))
    }
}

/// Outcome of a key lookup that did not produce a key.
#[derive(Debug, Error)]
pub enum KeyLookupError {
    #[error("no signing key with kid {0:?}")]
    UnknownKey(String),
    #[error(transparent)]
    Unavailable(#[from] JwksError),
}

/// One fetched generation of the key set.
struct KeySet {
    keys: HashMap<String, DecodingKey>,
    fetched_at: DateTime<Utc>,
}

impl KeySet {
    fn from_jwks(set: &JwkSet, fetched_at: DateTime<Utc>) -> Self {
        let keys = set
            .keys
            .iter()
            .filter_map(|jwk| match usable_key(jwk) {
                Some(pair) => Some(pair),
                None => {
                    warn!(kid = ?jwk.common.key_id, "skipping unusable jwk");
                    None
                }
            })
            .collect();
        Self { keys, fetched_at }
    }
}

fn usable_key(jwk: &Jwk) -> Option<(String, DecodingKey)> {
    let kid = jwk.common.key_id.clone()?;
    let key = DecodingKey::from_jwk(jwk).ok()?;
    Some((kid, key))
}

pub struct KeyCache {
    fetcher: Arc<dyn JwksFetcher>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    min_refresh_interval: Duration,
    current: RwLock<Option<Arc<KeySet>>>,
    // error of the latest attempt, None once an attempt succeeds
    refresh: Mutex<Option<String>>,
    // completed refresh attempts
    attempts: AtomicU64,
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("ttl", &self.ttl)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish()
    }
}

impl KeyCache {
    pub fn new(
        fetcher: Arc<dyn JwksFetcher>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        min_refresh_interval: Duration,
    ) -> Self {
        Self {
            fetcher,
            clock,
            ttl,
            min_refresh_interval,
            current: RwLock::new(None),
            refresh: Mutex::new(None),
            attempts: AtomicU64::new(0),
        }
    }

    /// Resolve the decoding key for `kid`, fetching or refreshing the set when needed.
    pub async fn key_for(&self, kid: &str) -> Result<DecodingKey, KeyLookupError> {
        let seen = self.current.read().await.clone();

        let set = match &seen {
            Some(set) if !self.is_older_than(set, self.ttl) => {
                if let Some(key) = set.keys.get(kid) {
                    return Ok(key.clone());
                }
                if !self.is_older_than(set, self.min_refresh_interval) {
                    debug!(kid, "unknown kid, key set too fresh to refresh");
                    return Err(KeyLookupError::UnknownKey(kid.to_string()));
                }
                info!(kid, "unknown kid, refreshing key set");
                self.refresh(seen.as_ref()).await?
            }
            _ => self.refresh(seen.as_ref()).await?,
        };

        set.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| KeyLookupError::UnknownKey(kid.to_string()))
    }

    fn is_older_than(&self, set: &KeySet, age: Duration) -> bool {
        let age = chrono::Duration::from_std(age).unwrap_or(chrono::Duration::MAX);
        self.clock.now() - set.fetched_at >= age
    }

    /// Single-flight refresh. `seen` is the generation the caller decided was
    /// insufficient; if another task already replaced it, that result is reused.
    /// If an attempt completed while this caller was queued and it failed, the
    /// caller gets that failure instead of fetching again.
    async fn refresh(&self, seen: Option<&Arc<KeySet>>) -> Result<Arc<KeySet>, JwksError> {
        let attempts_seen = self.attempts.load(Ordering::Acquire);
        let mut last_failure = self.refresh.lock().await;

        if let Some(latest) = self.current.read().await.clone()
            && seen.is_none_or(|s| !Arc::ptr_eq(s, &latest))
        {
            return Ok(latest);
        }
        if self.attempts.load(Ordering::Acquire) != attempts_seen
            && let Some(reason) = last_failure.as_ref()
        {
            debug!("jwks refresh failed while queued, not refetching");
            return Err(JwksError::SharedFailure(reason.clone()));
        }

        let result = self.fetch_with_retry().await;
        self.attempts.fetch_add(1, Ordering::AcqRel);

        match result {
            Ok(jwks) => {
                *last_failure = None;
                let set = Arc::new(KeySet::from_jwks(&jwks, self.clock.now()));
                info!(keys = set.keys.len(), "jwks refreshed");
                *self.current.write().await = Some(set.clone());
                Ok(set)
            }
            Err(err) => {
                *last_failure = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn fetch_with_retry(&self) -> Result<JwkSet, JwksError> {
        match self.fetcher.fetch().await {
            Ok(jwks) => Ok(jwks),
            Err(err) => {
                warn!(error = %err, "jwks fetch failed, retrying once");
                self.fetcher.fetch().await.inspect_err(|err| {
                    warn!(error = %err, "jwks fetch failed after retry");
                })
            }
        }
    }
}
