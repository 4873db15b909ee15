/// Self-service profile endpoints
///
/// # Endpoints
///
/// - `GET /api/users/me` - Current profile
/// - `PUT /api/users/me` - Change email and/or username
/// - `POST /api/users/me/change-password` - Change password, ends all sessions
/// - `DELETE /api/users/me` - Delete the account and everything it owns

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::auth::CurrentUser,
    routes::MessageResponse,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use toadoo_shared::models::user::{User, UserRole};
use uuid::Uuid;
use validator::Validate;

/// Public view of a user
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: UserRole,
    pub is_active: bool,
    pub is_verified: bool,
    pub total_completed_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            role: user.role,
            is_active: user.is_active,
            is_verified: user.is_verified,
            total_completed_count: user.total_completed_count,
            created_at: user.created_at,
        }
    }
}

/// Profile update request; omitted fields stay unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    pub username: Option<String>,
}

/// Password change request
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Returns the caller's profile
pub async fn get_profile(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<UserResponse> {
    Json(user.into())
}

/// Updates email and/or username
///
/// # Errors
///
/// - `400 Bad Request`: email or username already in use
/// - `422 Unprocessable Entity`: malformed email or username
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(mut req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    req.email = req.email.map(|e| e.trim().to_string());
    req.validate()?;

    let updated = state.auth.update_profile(&user, req.email, req.username).await?;
    Ok(Json(updated.into()))
}

/// Changes the password and revokes every refresh token of the caller
pub async fn change_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .auth
        .change_password(&user, &req.old_password, &req.new_password)
        .await?;

    Ok(Json(MessageResponse::new(
        "Password changed successfully. Please login again.",
    )))
}

/// Deletes the caller's account, todos, harvest history and tokens
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<StatusCode> {
    if !state.store.delete_user(user.id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %user.id, "Account deleted by owner");
    Ok(StatusCode::NO_CONTENT)
}
