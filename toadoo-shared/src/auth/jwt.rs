/// JWT token codec
///
/// Signs and verifies the bearer tokens handed to clients. A token carries the
/// subject (user id), an expiry, and a type tag telling access tokens apart
/// from refresh tokens. Refresh tokens also carry a random `jti` so two tokens
/// minted for the same user in the same second never collide.
///
/// The codec is stateless. It knows nothing about revocation; a refresh token
/// can verify here and still be rejected by the token store.
///
/// # Security
///
/// - **Algorithms**: HMAC only (HS256 default, HS384 and HS512 accepted)
/// - **Validation**: signature, `exp` and `nbf` with zero leeway, issuer, type tag
/// - **Secret**: at least 32 bytes, enforced by configuration loading
///
/// # Example
///
/// ```
/// use chrono::Duration;
/// use jsonwebtoken::Algorithm;
/// use toadoo_shared::auth::jwt::{TokenCodec, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let codec = TokenCodec::new(
///     "a-secret-that-is-at-least-32-bytes-long",
///     Algorithm::HS256,
///     Duration::minutes(30),
///     Duration::days(7),
/// )?;
///
/// let user_id = Uuid::new_v4();
/// let token = codec.issue_access(user_id)?;
/// let claims = codec.decode(&token, TokenType::Access)?;
/// assert_eq!(claims.sub, user_id);
/// # Ok(())
/// # }
/// ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::opaque::generate_token;

/// Issuer claim stamped into every token
pub const ISSUER: &str = "toadoo";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, issuer or structural validation failed
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token verified but carries the wrong type tag
    #[error("Invalid token type: expected {expected}, got {actual}")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },

    /// Configured algorithm is not an HMAC algorithm
    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived bearer credential
    Access,

    /// Long-lived, store-backed credential used to mint new access tokens
    Refresh,
}

impl TokenType {
    /// Gets token type as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: Uuid,

    /// Issuer - always "toadoo"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Access or refresh
    #[serde(rename = "type")]
    pub token_type: TokenType,

    /// Unique token id (refresh tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    /// Creates claims expiring `expires_in` from now
    pub fn with_expiration(user_id: Uuid, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now();
        let expiration = now + expires_in;

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            nbf: now.timestamp(),
            token_type,
            jti: match token_type {
                TokenType::Access => None,
                TokenType::Refresh => Some(generate_token()),
            },
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Expiry as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A freshly minted refresh token together with its decoded claims
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Encoded token handed to the client
    pub token: String,

    /// Claims the token was built from
    pub claims: Claims,
}

impl IssuedToken {
    /// Expiry shared by the JWT and the stored row
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at()
    }
}

/// Parses an algorithm name, accepting only HMAC algorithms
pub fn parse_algorithm(name: &str) -> Result<Algorithm, JwtError> {
    let algorithm = Algorithm::from_str(name.trim())
        .map_err(|_| JwtError::UnsupportedAlgorithm(name.to_string()))?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        _ => Err(JwtError::UnsupportedAlgorithm(name.to_string())),
    }
}

/// Stateless signer/verifier for access and refresh tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Creates a codec from a shared secret
    ///
    /// # Errors
    ///
    /// Returns `JwtError::UnsupportedAlgorithm` for non-HMAC algorithms.
    pub fn new(
        secret: &str,
        algorithm: Algorithm,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, JwtError> {
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(JwtError::UnsupportedAlgorithm(format!("{:?}", algorithm)));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            access_ttl,
            refresh_ttl,
        })
    }

    /// Access token lifetime
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Refresh token lifetime
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Signs arbitrary claims
    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
    }

    /// Verifies a token and checks its type tag
    ///
    /// Fails if the signature does not verify, the payload is malformed, the
    /// issuer is wrong, the token is expired or not yet valid, or the type tag
    /// differs from `expected`.
    pub fn decode(&self, token: &str, expected: TokenType) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[ISSUER]);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
            }
        })?;

        let claims = token_data.claims;
        if claims.token_type != expected {
            return Err(JwtError::WrongType {
                expected: expected.as_str(),
                actual: claims.token_type.as_str(),
            });
        }

        Ok(claims)
    }

    /// Mints an access token for a user
    pub fn issue_access(&self, user_id: Uuid) -> Result<String, JwtError> {
        let claims = Claims::with_expiration(user_id, TokenType::Access, self.access_ttl);
        self.encode(&claims)
    }

    /// Mints a refresh token for a user
    pub fn issue_refresh(&self, user_id: Uuid) -> Result<IssuedToken, JwtError> {
        let claims = Claims::with_expiration(user_id, TokenType::Refresh, self.refresh_ttl);
        let token = self.encode(&claims)?;

        Ok(IssuedToken { token, claims })
    }
}
