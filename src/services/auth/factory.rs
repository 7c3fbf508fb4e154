/// Factory: build `TokenVerifier` from application `Config`.
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::services::auth::{
    TokenVerifier,
    clock::SystemClock,
    jwks::{HttpJwksFetcher, JwksError, KeyCache},
};

pub fn build_token_verifier(config: &AuthConfig) -> Result<Arc<TokenVerifier>, JwksError> {
    let fetcher = HttpJwksFetcher::new(&config.jwks_url, config.jwks_fetch_timeout)?;
    let clock = Arc::new(SystemClock);

    let keys = Arc::new(KeyCache::new(
        Arc::new(fetcher),
        clock.clone(),
        config.jwks_cache_ttl,
        config.jwks_min_refresh_interval,
    ));

    tracing::info!(jwks_url = %config.jwks_url, issuer = %config.issuer, "token verifier ready");
    Ok(Arc::new(TokenVerifier::new(config, keys, clock)))
}
