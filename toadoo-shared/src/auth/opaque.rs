/// Opaque random tokens and their storage digests
///
/// Email verification and password reset tokens are plain random strings.
/// Every token kind, refresh tokens included, is persisted only as a SHA-256
/// digest, so a leaked table does not hand out usable credentials.
///
/// # Example
///
/// ```
/// use toadoo_shared::auth::opaque::{generate_token, hash_token, TOKEN_LENGTH};
///
/// let token = generate_token();
/// assert_eq!(token.len(), TOKEN_LENGTH);
/// assert_eq!(hash_token(&token).len(), 64);
/// assert_eq!(hash_token(&token), hash_token(&token));
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of a generated token (base62 characters, ~256 bits)
pub const TOKEN_LENGTH: usize = 43;

/// Number of characters kept when a token is written to logs
const LOG_PREFIX_LENGTH: usize = 10;

/// Generates a cryptographically random, URL-safe base62 token
pub fn generate_token() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    (0..TOKEN_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Hex-encoded SHA-256 digest used as the storage key for a token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Short prefix that is safe to log
pub fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(LOG_PREFIX_LENGTH).collect();
    format!("{}...", prefix)
}
