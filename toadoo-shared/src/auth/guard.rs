/// Per-request identity resolution
///
/// Turns a bearer credential into the current [`User`] and checks it
/// against a [`Requirement`]. Requirements are ordered; each one includes all
/// checks of the levels below it:
///
/// | Level           | Check                 | Failure          |
/// |-----------------|-----------------------|------------------|
/// | `Authenticated` | token decodes, user exists | `Unauthenticated` |
/// | `Active`        | `is_active`           | `Forbidden`      |
/// | `Verified`      | `is_verified`         | `Forbidden`      |
/// | `Admin`         | `role == admin`       | `Forbidden`      |
///
/// The guard is transport-agnostic; the HTTP layer extracts the header and
/// maps [`GuardError`] to status codes.
///
/// # Example
///
/// ```
/// use toadoo_shared::auth::guard::{bearer_token, Requirement};
///
/// assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
/// assert_eq!(bearer_token("Basic abc"), None);
/// assert!(Requirement::Admin > Requirement::Verified);
/// ```

use std::sync::Arc;

use tracing::debug;

use super::jwt::{TokenCodec, TokenType};
use crate::models::user::User;
use crate::store::{Store, StoreError};

/// Access level an endpoint demands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Requirement {
    Authenticated,
    Active,
    Verified,
    Admin,
}

/// Guard rejection
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// Missing, malformed, expired or orphaned credential
    #[error("Could not validate credentials")]
    Unauthenticated,

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Extracts the token from an `Authorization` header value
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Checks an already-resolved user against a requirement
pub fn check(user: &User, requirement: Requirement) -> Result<(), GuardError> {
    if requirement >= Requirement::Active && !user.is_active {
        return Err(GuardError::Forbidden("Inactive user"));
    }

    if requirement >= Requirement::Verified && !user.is_verified {
        return Err(GuardError::Forbidden("Email not verified"));
    }

    if requirement >= Requirement::Admin && !user.is_admin() {
        return Err(GuardError::Forbidden("Not enough permissions"));
    }

    Ok(())
}

/// Resolves bearer credentials against the codec and the user store
#[derive(Clone)]
pub struct AccessGuard {
    store: Arc<dyn Store>,
    codec: TokenCodec,
}

impl AccessGuard {
    pub fn new(store: Arc<dyn Store>, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    /// Resolves the user behind an access token
    pub async fn authenticate(&self, token: Option<&str>) -> Result<User, GuardError> {
        let token = token.ok_or(GuardError::Unauthenticated)?;

        let claims = self.codec.decode(token, TokenType::Access).map_err(|e| {
            debug!(error = %e, "Rejected access token");
            GuardError::Unauthenticated
        })?;

        self.store
            .user_by_id(claims.sub)
            .await?
            .ok_or(GuardError::Unauthenticated)
    }

    /// Resolves the user and enforces `requirement`
    pub async fn require(
        &self,
        token: Option<&str>,
        requirement: Requirement,
    ) -> Result<User, GuardError> {
        let user = self.authenticate(token).await?;
        check(&user, requirement)?;
        Ok(user)
    }

    /// Optional authentication
    ///
    /// No credential, or one that does not resolve to a user, yields
    /// `Ok(None)`. Only storage failures are errors.
    pub async fn optional(&self, token: Option<&str>) -> Result<Option<User>, GuardError> {
        match self.authenticate(token).await {
            Ok(user) => Ok(Some(user)),
            Err(GuardError::Unauthenticated) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
