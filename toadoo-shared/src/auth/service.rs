/// Account and session flows
///
/// [`AuthService`] composes the credential hasher, the token codec, the
/// store and the mailer into the register / login / refresh / logout /
/// verify-email / forgot-password / reset-password flows, plus the
/// self-service password change and the expired-token sweep.
///
/// # Token handling
///
/// - Refresh tokens are JWTs whose SHA-256 digest is stored server side. A
///   refresh succeeds only if the digest row is active **and** the JWT
///   verifies; the row's `expires_at` is the JWT's `exp`.
/// - Every refresh rotates: the presented row is revoked and a new one stored
///   in the same atomic store call.
/// - Verification and reset tokens are opaque random strings, stored hashed
///   and consumed once.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use chrono::Duration;
/// use jsonwebtoken::Algorithm;
/// use toadoo_shared::auth::jwt::TokenCodec;
/// use toadoo_shared::auth::password::{CredentialHasher, HashParams};
/// use toadoo_shared::auth::service::{AuthService, Registration, TokenLifetimes};
/// use toadoo_shared::mailer::RecordingMailer;
/// use toadoo_shared::store::memory::MemoryStore;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let codec = TokenCodec::new(
///     "a-secret-that-is-at-least-32-bytes-long",
///     Algorithm::HS256,
///     Duration::minutes(30),
///     Duration::days(7),
/// )?;
/// let service = AuthService::new(
///     Arc::new(MemoryStore::new()),
///     codec,
///     CredentialHasher::new(HashParams::light()),
///     Arc::new(RecordingMailer::new()),
///     TokenLifetimes::default(),
/// );
///
/// service
///     .register(Registration {
///         email: "amy@example.com".into(),
///         username: "amy".into(),
///         password: "Passw0rd".into(),
///     })
///     .await?;
///
/// let pair = service.login("amy", "Passw0rd").await?;
/// let rotated = service.refresh(&pair.refresh_token).await?;
/// assert!(service.refresh(&pair.refresh_token).await.is_err());
/// # let _ = rotated;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::jwt::{JwtError, TokenCodec, TokenType};
use super::opaque::{generate_token, hash_token, token_prefix};
use super::password::{validate_password_strength, CredentialHasher, PasswordError};
use crate::mailer::Mailer;
use crate::models::token::{SingleUseKind, SweepReport};
use crate::models::user::{normalize_email, NewUser, User, UserProfileUpdate};
use crate::store::{Store, StoreError};

/// Response to forgot-password, identical whether or not the email exists
pub const FORGOT_PASSWORD_MESSAGE: &str = "If email exists, password reset link has been sent";

/// Auth flow failure
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    /// Email or username already taken
    #[error("{0}")]
    Conflict(&'static str),

    /// Unknown login or wrong password; deliberately indistinguishable
    #[error("Incorrect username or password")]
    InvalidCredentials,

    /// Account deactivated
    #[error("User account is inactive")]
    Inactive,

    /// Refresh token unknown, revoked, expired or forged
    #[error("Invalid or revoked refresh token")]
    InvalidToken,

    /// Verification or reset token unusable
    #[error("Invalid or expired {0} token")]
    InvalidOrExpired(&'static str),

    #[error("User not found")]
    NotFound,

    #[error("Email already verified")]
    AlreadyVerified,

    #[error("{0}")]
    WeakPassword(String),

    #[error("Incorrect current password")]
    IncorrectPassword,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Jwt(#[from] JwtError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict("email") => AuthServiceError::Conflict("Email already registered"),
            StoreError::Conflict("username") => AuthServiceError::Conflict("Username already taken"),
            other => AuthServiceError::Store(other),
        }
    }
}

/// Access + refresh token pair returned by login and refresh
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Registration input, already shape-validated by the caller
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Lifetimes of the single-use tokens
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub email_verification: Duration,
    pub password_reset: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            email_verification: Duration::hours(24),
            password_reset: Duration::hours(1),
        }
    }
}

/// Orchestrates account and session flows
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    codec: TokenCodec,
    hasher: CredentialHasher,
    mailer: Arc<dyn Mailer>,
    lifetimes: TokenLifetimes,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn Store>,
        codec: TokenCodec,
        hasher: CredentialHasher,
        mailer: Arc<dyn Mailer>,
        lifetimes: TokenLifetimes,
    ) -> Self {
        Self {
            store,
            codec,
            hasher,
            mailer,
            lifetimes,
        }
    }

    /// Creates an account and sends the verification mail
    ///
    /// Emails are compared case-insensitively, usernames exactly.
    pub async fn register(&self, input: Registration) -> Result<User, AuthServiceError> {
        validate_password_strength(&input.password).map_err(AuthServiceError::WeakPassword)?;

        let email = normalize_email(&input.email);
        if self.store.user_by_email(&email).await?.is_some() {
            return Err(AuthServiceError::Conflict("Email already registered"));
        }
        if self.store.user_by_username(&input.username).await?.is_some() {
            return Err(AuthServiceError::Conflict("Username already taken"));
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let user = self
            .store
            .create_user(NewUser {
                email,
                username: input.username,
                password_hash,
            })
            .await?;

        info!(user_id = %user.id, username = %user.username, "User registered");

        if let Err(e) = self.send_verification(&user).await {
            warn!(user_id = %user.id, error = %e, "Could not issue verification email");
        }

        Ok(user)
    }

    /// Exchanges credentials for a token pair
    ///
    /// `identifier` is a username or an email. There is no lockout; failed
    /// attempts have no lasting effect.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<TokenPair, AuthServiceError> {
        let Some(user) = self.store.user_by_login(identifier.trim()).await? else {
            debug!("Login failed: unknown identifier");
            return Err(AuthServiceError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &user.password_hash)? {
            debug!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthServiceError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthServiceError::Inactive);
        }

        let pair = self.issue_pair(user.id).await?;
        info!(user_id = %user.id, "User logged in");
        Ok(pair)
    }

    /// Rotates a refresh token
    ///
    /// The presented token stops working whether or not the caller ever
    /// receives the new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthServiceError> {
        let token_hash = hash_token(refresh_token);

        let record = self
            .store
            .active_refresh(&token_hash, Utc::now())
            .await?
            .ok_or(AuthServiceError::InvalidToken)?;

        let claims = self
            .codec
            .decode(refresh_token, TokenType::Refresh)
            .map_err(|e| {
                debug!(error = %e, "Stored refresh token failed verification");
                AuthServiceError::InvalidToken
            })?;

        if claims.sub != record.user_id {
            warn!(user_id = %record.user_id, "Refresh token subject does not match its owner");
            return Err(AuthServiceError::InvalidToken);
        }

        match self.store.user_by_id(claims.sub).await? {
            Some(user) if user.is_active => {}
            _ => return Err(AuthServiceError::InvalidToken),
        }

        let next = self.codec.issue_refresh(claims.sub)?;
        let rotated = self
            .store
            .rotate_refresh(&token_hash, &hash_token(&next.token), claims.sub, next.expires_at())
            .await?;

        if !rotated {
            debug!(user_id = %claims.sub, "Refresh token lost a rotation race");
            return Err(AuthServiceError::InvalidToken);
        }

        let access_token = self.codec.issue_access(claims.sub)?;
        debug!(user_id = %claims.sub, "Refresh token rotated");

        Ok(TokenPair {
            access_token,
            refresh_token: next.token,
            token_type: "bearer",
            expires_in: self.codec.access_ttl().num_seconds(),
        })
    }

    /// Revokes a refresh token; unknown or already revoked tokens are fine
    pub async fn logout(&self, user_id: Uuid, refresh_token: &str) -> Result<(), AuthServiceError> {
        let revoked = self.store.revoke_refresh(&hash_token(refresh_token)).await?;
        debug!(user_id = %user_id, revoked, "User logged out");
        Ok(())
    }

    /// Consumes a verification token and marks its user verified
    ///
    /// A token whose user is gone stays unused and is reported like an
    /// expired one.
    pub async fn verify_email(&self, token: &str) -> Result<User, AuthServiceError> {
        let user = self
            .store
            .consume_verification(&hash_token(token), Utc::now())
            .await?
            .ok_or(AuthServiceError::InvalidOrExpired("verification"))?;

        info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    /// Issues and mails a fresh verification token
    pub async fn resend_verification(&self, user: &User) -> Result<(), AuthServiceError> {
        if user.is_verified {
            return Err(AuthServiceError::AlreadyVerified);
        }

        self.send_verification(user).await
    }

    /// Starts a password reset
    ///
    /// Always returns [`FORGOT_PASSWORD_MESSAGE`]; whether a mail went out is
    /// never revealed.
    pub async fn forgot_password(&self, email: &str) -> Result<&'static str, AuthServiceError> {
        let email = normalize_email(email);

        if let Some(user) = self.store.user_by_email(&email).await? {
            let token = generate_token();
            self.store
                .insert_single_use(
                    SingleUseKind::PasswordReset,
                    &hash_token(&token),
                    user.id,
                    Utc::now() + self.lifetimes.password_reset,
                )
                .await?;

            if let Err(e) = self.mailer.send_password_reset(&user.email, &token).await {
                warn!(user_id = %user.id, error = %e, "Could not send password reset email");
            }
            debug!(user_id = %user.id, token = %token_prefix(&token), "Password reset issued");
        }

        Ok(FORGOT_PASSWORD_MESSAGE)
    }

    /// Completes a password reset and signs the user out everywhere
    ///
    /// Consuming the token, storing the new hash and revoking every refresh
    /// token happen as one store operation; concurrent resets with the same
    /// token have exactly one winner.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<User, AuthServiceError> {
        validate_password_strength(new_password).map_err(AuthServiceError::WeakPassword)?;

        let password_hash = self.hasher.hash(new_password)?;
        let (user, revoked) = self
            .store
            .consume_password_reset(&hash_token(token), &password_hash, Utc::now())
            .await?
            .ok_or(AuthServiceError::InvalidOrExpired("reset"))?;

        info!(user_id = %user.id, revoked, "Password reset; refresh tokens revoked");
        Ok(user)
    }

    /// Changes the password of a signed-in user and signs them out everywhere
    pub async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthServiceError> {
        if !self.hasher.verify(current_password, &user.password_hash)? {
            return Err(AuthServiceError::IncorrectPassword);
        }

        validate_password_strength(new_password).map_err(AuthServiceError::WeakPassword)?;

        let password_hash = self.hasher.hash(new_password)?;
        self.store
            .set_password_hash(user.id, &password_hash)
            .await?
            .ok_or(AuthServiceError::NotFound)?;

        let revoked = self.store.revoke_all_refresh(user.id).await?;
        info!(user_id = %user.id, revoked, "Password changed; refresh tokens revoked");
        Ok(())
    }

    /// Applies a self-service profile change
    pub async fn update_profile(
        &self,
        user: &User,
        email: Option<String>,
        username: Option<String>,
    ) -> Result<User, AuthServiceError> {
        let email = email.map(|e| normalize_email(&e)).filter(|e| *e != user.email);
        let username = username.filter(|u| *u != user.username);

        if let Some(email) = &email {
            if self.store.user_by_email(email).await?.is_some() {
                return Err(AuthServiceError::Conflict("Email already in use"));
            }
        }
        if let Some(username) = &username {
            if self.store.user_by_username(username).await?.is_some() {
                return Err(AuthServiceError::Conflict("Username already taken"));
            }
        }

        let updated = self
            .store
            .update_profile(user.id, &UserProfileUpdate { email, username })
            .await
            .map_err(|e| match e {
                StoreError::Conflict("email") => AuthServiceError::Conflict("Email already in use"),
                other => other.into(),
            })?
            .ok_or(AuthServiceError::NotFound)?;

        Ok(updated)
    }

    /// Deletes expired rows of every token kind
    pub async fn sweep_expired_tokens(&self) -> Result<SweepReport, AuthServiceError> {
        let report = self.store.sweep_expired(Utc::now()).await?;
        info!(removed = report.total(), "Expired tokens swept");
        Ok(report)
    }

    async fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, AuthServiceError> {
        let access_token = self.codec.issue_access(user_id)?;
        let refresh = self.codec.issue_refresh(user_id)?;

        self.store
            .insert_refresh(&hash_token(&refresh.token), user_id, refresh.expires_at())
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token: refresh.token,
            token_type: "bearer",
            expires_in: self.codec.access_ttl().num_seconds(),
        })
    }

    async fn send_verification(&self, user: &User) -> Result<(), AuthServiceError> {
        let token = generate_token();
        self.store
            .insert_single_use(
                SingleUseKind::EmailVerification,
                &hash_token(&token),
                user.id,
                Utc::now() + self.lifetimes.email_verification,
            )
            .await?;

        if let Err(e) = self.mailer.send_verification(&user.email, &token).await {
            warn!(user_id = %user.id, error = %e, "Could not send verification email");
        }
        Ok(())
    }
}
