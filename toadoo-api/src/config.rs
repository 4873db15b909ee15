/// Configuration management for the API server
///
/// Configuration is read once at startup into an immutable [`Config`] and
/// shared through `AppState`. Parsing is a pure function over a key lookup
/// ([`Config::from_vars`]) so it can be tested without touching the process
/// environment.
///
/// # Environment Variables
///
/// | Variable | Default |
/// |----------|---------|
/// | `API_HOST` | `0.0.0.0` |
/// | `API_PORT` | `8080` |
/// | `PRODUCTION` | `false` |
/// | `CORS_ORIGINS` | `http://localhost:3000,http://localhost:5173` (`*` = any) |
/// | `DATABASE_URL` | required |
/// | `DATABASE_MAX_CONNECTIONS` | `10` |
/// | `JWT_SECRET` | required, at least 32 characters |
/// | `JWT_ALGORITHM` | `HS256` (`HS384`, `HS512`) |
/// | `ACCESS_TOKEN_EXPIRE_MINUTES` | `30` |
/// | `REFRESH_TOKEN_EXPIRE_DAYS` | `7` |
/// | `EMAIL_VERIFICATION_EXPIRE_HOURS` | `24` |
/// | `PASSWORD_RESET_EXPIRE_HOURS` | `1` |
/// | `EMAIL_ENABLED` | `false` |
/// | `EMAIL_FROM` | `noreply@toadoo.app` |
/// | `REQUIRE_VERIFIED_EMAIL` | `false` |
/// | `ARGON2_MEMORY_KIB` / `ARGON2_ITERATIONS` / `ARGON2_PARALLELISM` | `65536` / `3` / `4` |
///
/// # Example
///
/// ```no_run
/// use toadoo_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use jsonwebtoken::Algorithm;
use toadoo_shared::auth::jwt::{parse_algorithm, JwtError, TokenCodec};
use toadoo_shared::auth::password::HashParams;
use toadoo_shared::auth::service::TokenLifetimes;
use toadoo_shared::db::pool::DatabaseConfig as PoolConfig;

/// Minimum JWT secret length in characters
pub const MIN_SECRET_LENGTH: usize = 32;

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub tokens: TokenConfig,
    pub email: EmailConfig,
    pub features: FeatureConfig,
    pub argon2: HashParams,
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Enables HSTS
    pub production: bool,

    /// Allowed CORS origins; `*` allows any origin
    pub cors_origins: Vec<String>,
}

/// Database settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Token signing settings
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC secret; never logged
    pub secret: String,
    pub algorithm: Algorithm,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("access_token_minutes", &self.access_token_minutes)
            .field("refresh_token_days", &self.refresh_token_days)
            .finish()
    }
}

/// Single-use token lifetimes
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub email_verification_hours: i64,
    pub password_reset_hours: i64,
}

/// Outbound mail settings
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub enabled: bool,
    pub from: String,
}

/// Feature flags
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    /// Todo routes demand a verified email when set
    pub require_verified_email: bool,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        None => Ok(default),
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> anyhow::Result<bool> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("Invalid value for {}: {:?} is not a boolean", key, other),
    }
}

/// Token lifetimes are capped at one year in their own unit
const MAX_LIFETIME_MINUTES: i64 = 365 * 24 * 60;
const MAX_LIFETIME_HOURS: i64 = 365 * 24;
const MAX_LIFETIME_DAYS: i64 = 365;

fn lifetime(key: &str, value: i64, max: i64) -> anyhow::Result<i64> {
    if value <= 0 {
        anyhow::bail!("{} must be positive", key);
    }
    if value > max {
        anyhow::bail!("{} must be at most {}", key, max);
    }
    Ok(value)
}

impl Config {
    /// Loads configuration from the process environment (and `.env`)
    ///
    /// # Errors
    ///
    /// Fails if a required variable is missing or any value is malformed.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.chars().count() < MIN_SECRET_LENGTH {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_SECRET_LENGTH);
        }

        let algorithm = parse_algorithm(&lookup("JWT_ALGORITHM").unwrap_or_else(|| "HS256".into()))?;

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            api: ApiConfig {
                host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "API_PORT", 8080)?,
                production: parse_bool(&lookup, "PRODUCTION", false)?,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                algorithm,
                access_token_minutes: lifetime(
                    "ACCESS_TOKEN_EXPIRE_MINUTES",
                    parse_or(&lookup, "ACCESS_TOKEN_EXPIRE_MINUTES", 30)?,
                    MAX_LIFETIME_MINUTES,
                )?,
                refresh_token_days: lifetime(
                    "REFRESH_TOKEN_EXPIRE_DAYS",
                    parse_or(&lookup, "REFRESH_TOKEN_EXPIRE_DAYS", 7)?,
                    MAX_LIFETIME_DAYS,
                )?,
            },
            tokens: TokenConfig {
                email_verification_hours: lifetime(
                    "EMAIL_VERIFICATION_EXPIRE_HOURS",
                    parse_or(&lookup, "EMAIL_VERIFICATION_EXPIRE_HOURS", 24)?,
                    MAX_LIFETIME_HOURS,
                )?,
                password_reset_hours: lifetime(
                    "PASSWORD_RESET_EXPIRE_HOURS",
                    parse_or(&lookup, "PASSWORD_RESET_EXPIRE_HOURS", 1)?,
                    MAX_LIFETIME_HOURS,
                )?,
            },
            email: EmailConfig {
                enabled: parse_bool(&lookup, "EMAIL_ENABLED", false)?,
                from: lookup("EMAIL_FROM").unwrap_or_else(|| "noreply@toadoo.app".to_string()),
            },
            features: FeatureConfig {
                require_verified_email: parse_bool(&lookup, "REQUIRE_VERIFIED_EMAIL", false)?,
            },
            argon2: HashParams {
                memory_kib: parse_or(&lookup, "ARGON2_MEMORY_KIB", 65536)?,
                iterations: parse_or(&lookup, "ARGON2_ITERATIONS", 3)?,
                parallelism: parse_or(&lookup, "ARGON2_PARALLELISM", 4)?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether CORS allows any origin
    pub fn cors_permissive(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }

    /// Token codec built from the JWT settings
    pub fn token_codec(&self) -> Result<TokenCodec, JwtError> {
        TokenCodec::new(
            &self.jwt.secret,
            self.jwt.algorithm,
            Duration::minutes(self.jwt.access_token_minutes),
            Duration::days(self.jwt.refresh_token_days),
        )
    }

    /// Single-use token lifetimes
    pub fn token_lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            email_verification: Duration::hours(self.tokens.email_verification_hours),
            password_reset: Duration::hours(self.tokens.password_reset_hours),
        }
    }

    /// Connection pool settings
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            ..Default::default()
        }
    }
}
