/*
 * Responsibility
 * - 環境変数や設定の読み込み (DATABASE_URL, CORS 許可、Auth 設定など)
 * - 設定値のバリデーション (不足なら起動失敗)
 * - 起動時に一度だけ組み立て、以降は &Config で読み取り専用として渡す
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Identity provider settings consumed by the token verifier.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: Option<String>,
    pub jwks_url: String,
    pub allowed_algorithms: Vec<Algorithm>,
    pub jwks_cache_ttl: Duration,
    pub jwks_min_refresh_interval: Duration,
    pub jwks_fetch_timeout: Duration,
    pub leeway_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    pub sqids_min_length: usize,
    pub sqids_alphabet: String,

    pub auth: AuthConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup (env in production, a map in tests).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = match get("PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let database_url = get("DATABASE_URL").filter(|s| !s.trim().is_empty());

        let database_max_connections = parse_or(&get, "DATABASE_MAX_CONNECTIONS", 5u32)?;

        let app_env = get("APP_ENV")
            .map(|v| AppEnv::parse(&v))
            .unwrap_or(AppEnv::Development);

        if app_env.is_production() && database_url.is_none() {
            // in-memory store is for local development only
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let sqids_min_length = parse_or(&get, "SQIDS_MIN_LENGTH", 10usize)?;

        let sqids_alphabet = get("SQIDS_ALPHABET").unwrap_or_else(|| {
            "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".to_string()
        });

        let auth = AuthConfig::from_lookup(&get)?;

        Ok(Self {
            addr,
            database_url,
            database_max_connections,
            app_env,
            cors_allowed_origins,
            sqids_min_length,
            sqids_alphabet,
            auth,
        })
    }
}

impl AuthConfig {
    fn from_lookup(get: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let issuer = get("AUTH_ISSUER")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("AUTH_ISSUER"))?;

        let audience = get("AUTH_AUDIENCE").filter(|s| !s.trim().is_empty());

        let jwks_url = match get("AUTH_JWKS_URL").filter(|s| !s.trim().is_empty()) {
            Some(url) => url,
            // Supabase layout: <project>/auth/v1/.well-known/jwks.json
            None => format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/')),
        };
        url::Url::parse(&jwks_url).map_err(|_| ConfigError::Invalid("AUTH_JWKS_URL"))?;

        let allowed_algorithms = match get("AUTH_ALLOWED_ALGORITHMS") {
            Some(raw) => parse_algorithms(&raw)?,
            None => vec![Algorithm::ES256, Algorithm::RS256, Algorithm::EdDSA],
        };

        let jwks_cache_ttl =
            Duration::from_secs(parse_or(get, "AUTH_JWKS_CACHE_TTL_SECONDS", 600u64)?);
        let jwks_min_refresh_interval =
            Duration::from_secs(parse_or(get, "AUTH_JWKS_MIN_REFRESH_SECONDS", 30u64)?);
        let jwks_fetch_timeout =
            Duration::from_secs(parse_or(get, "AUTH_JWKS_FETCH_TIMEOUT_SECONDS", 5u64)?);
        if jwks_fetch_timeout.is_zero() {
            return Err(ConfigError::Invalid("AUTH_JWKS_FETCH_TIMEOUT_SECONDS"));
        }

        let leeway_seconds = parse_or(get, "ACCESS_TOKEN_LEEWAY_SECONDS", 0u64)?;

        Ok(Self {
            issuer,
            audience,
            jwks_url,
            allowed_algorithms,
            jwks_cache_ttl,
            jwks_min_refresh_interval,
            jwks_fetch_timeout,
            leeway_seconds,
        })
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn parse_algorithms(raw: &str) -> Result<Vec<Algorithm>, ConfigError> {
    let algs = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Algorithm::from_str(s).map_err(|_| ConfigError::Invalid("AUTH_ALLOWED_ALGORITHMS"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Symmetric algorithms make no sense against a published key set.
    let symmetric = algs
        .iter()
        .any(|a| matches!(a, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512));
    if algs.is_empty() || symmetric {
        return Err(ConfigError::Invalid("AUTH_ALLOWED_ALGORITHMS"));
    }
    Ok(algs)
}
