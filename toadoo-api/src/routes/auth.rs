/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/auth/register` - Create an account (201)
/// - `POST /api/auth/login` - Username or email plus password for a token pair
/// - `POST /api/auth/refresh` - Rotate a refresh token
/// - `POST /api/auth/logout` - Revoke a refresh token (204)
/// - `GET /api/auth/me` - Current user
/// - `POST /api/auth/verify-email` - Consume a verification token
/// - `POST /api/auth/resend-verification` - Mail a fresh verification token
/// - `POST /api/auth/forgot-password` - Start a password reset
/// - `POST /api/auth/reset-password` - Finish a password reset
///
/// Login failures and forgot-password answers never reveal whether an
/// account exists.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::auth::CurrentUser,
    routes::{users::UserResponse, MessageResponse},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;
use toadoo_shared::auth::service::{Registration, TokenPair};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    pub username: String,

    /// Strength rules are checked by the auth service
    #[validate(length(min = 8, max = 100, message = "Password must be between 8 and 100 characters"))]
    pub password: String,
}

/// Login request; `username` may also hold an email address
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Refresh and logout request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Single-use token request
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

/// Forgot-password request
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Reset-password request
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Registers a new account
///
/// # Example
///
/// ```text
/// POST /api/auth/register
/// Content-Type: application/json
///
/// {"email": "amy@example.com", "username": "amy", "password": "Secret123"}
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: email already registered or username taken
/// - `422 Unprocessable Entity`: malformed input or weak password
pub async fn register(
    State(state): State<AppState>,
    Json(mut req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    req.email = req.email.trim().to_string();
    req.validate()?;

    let user = state
        .auth
        .register(Registration {
            email: req.email,
            username: req.username,
            password: req.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Exchanges credentials for an access and refresh token
///
/// # Response
///
/// ```json
/// {
///   "access_token": "eyJ...",
///   "refresh_token": "eyJ...",
///   "token_type": "bearer",
///   "expires_in": 1800
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: unknown user or wrong password (same body for both)
/// - `403 Forbidden`: account deactivated
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    let pair = state.auth.login(&req.username, &req.password).await?;
    Ok(Json(pair))
}

/// Rotates a refresh token; the presented token is spent either way
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let pair = state.auth.refresh(&req.refresh_token).await?;
    Ok(Json(pair))
}

/// Revokes the given refresh token
pub async fn logout(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<StatusCode> {
    state.auth.logout(user.id, &req.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the authenticated user
pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<UserResponse> {
    Json(user.into())
}

/// Consumes an email verification token
///
/// # Errors
///
/// - `400 Bad Request`: unknown, used or expired token
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = state.auth.verify_email(&req.token).await?;
    Ok(Json(user.into()))
}

/// Mails a fresh verification token to the caller
///
/// Open to inactive accounts too; `400` when already verified.
pub async fn resend_verification(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<MessageResponse>> {
    state.auth.resend_verification(&user).await?;
    Ok(Json(MessageResponse::new("Verification email sent")))
}

/// Starts a password reset; the answer is identical for unknown emails
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let message = state.auth.forgot_password(&req.email).await?;
    Ok(Json(MessageResponse::new(message)))
}

/// Sets a new password from a reset token and ends every session
///
/// # Errors
///
/// - `400 Bad Request`: unknown, used or expired token
/// - `422 Unprocessable Entity`: weak password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<UserResponse>> {
    if req.token.is_empty() {
        return Err(ApiError::invalid_field("token", "Token is required"));
    }

    let user = state.auth.reset_password(&req.token, &req.new_password).await?;
    Ok(Json(user.into()))
}
