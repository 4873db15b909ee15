/// Administration endpoints
///
/// All routes sit behind the admin guard. Admins cannot change their own role
/// or status, or delete themselves, so the last admin cannot lock everyone out.
///
/// # Endpoints
///
/// - `GET /api/admin/users` - List users (`skip`, `limit`, `is_active`, `role`)
/// - `GET /api/admin/users/:id` - Fetch a user
/// - `PUT /api/admin/users/:id/role` - Change role
/// - `PUT /api/admin/users/:id/status` - Activate or deactivate
/// - `DELETE /api/admin/users/:id` - Delete a user and everything they own
/// - `GET /api/admin/todos` - Unscoped todo listing (`skip`, `limit`, `status`, `user_id`)
/// - `GET /api/admin/stats` - User and todo counts
/// - `POST /api/admin/maintenance/sweep-tokens` - Purge expired tokens

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::auth::CurrentUser,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use toadoo_shared::models::todo::{Todo, TodoFilter, TodoStats, TodoStatus};
use toadoo_shared::models::user::{User, UserFilter, UserRole, UserStats};
use toadoo_shared::store::clamp_page;
use uuid::Uuid;

const DEFAULT_PAGE: i64 = 100;
const MAX_PAGE: i64 = 1000;

/// Admin view of a user
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminUserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: UserRole,
    pub is_active: bool,
    pub is_verified: bool,
    pub total_completed_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for AdminUserResponse {
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
            updated_at: user.updated_at,
        }
    }
}

/// User listing query
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub is_active: Option<bool>,
    pub role: Option<UserRole>,
}

/// Todo listing query
#[derive(Debug, Default, Deserialize)]
pub struct ListTodosQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<TodoStatus>,
    pub user_id: Option<Uuid>,
}

/// Role change request
#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

/// Status change request
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

/// Dashboard counts
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub users: UserStats,
    pub todos: TodoStats,
}

/// Rows removed per token kind
#[derive(Debug, Serialize, Deserialize)]
pub struct SweepResponse {
    pub refresh_tokens: u64,
    pub email_verification_tokens: u64,
    pub password_reset_tokens: u64,
    pub total: u64,
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

fn reject_self(admin: &User, target: Uuid, message: &str) -> ApiResult<()> {
    if admin.id == target {
        return Err(ApiError::BadRequest(message.to_string()));
    }
    Ok(())
}

/// Lists users
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<Vec<AdminUserResponse>>> {
    let (skip, limit) = clamp_page(query.skip, query.limit, DEFAULT_PAGE, MAX_PAGE);
    let filter = UserFilter {
        is_active: query.is_active,
        role: query.role,
        skip,
        limit,
    };

    let users = state.store.list_users(&filter).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// Fetches a user by id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AdminUserResponse>> {
    let user = state.store.user_by_id(id).await?.ok_or_else(user_not_found)?;
    Ok(Json(user.into()))
}

/// Changes a user's role
pub async fn update_role(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<AdminUserResponse>> {
    reject_self(&admin, id, "Cannot change your own role")?;

    let user = state
        .store
        .set_role(id, req.role)
        .await?
        .ok_or_else(user_not_found)?;

    tracing::info!(admin_id = %admin.id, user_id = %id, role = req.role.as_str(), "User role changed");
    Ok(Json(user.into()))
}

/// Activates or deactivates a user
///
/// Deactivation takes effect on the user's next request; outstanding access
/// tokens stop working because every guard re-reads the account.
pub async fn update_status(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<AdminUserResponse>> {
    reject_self(&admin, id, "Cannot deactivate your own account")?;

    let user = state
        .store
        .set_active(id, req.is_active)
        .await?
        .ok_or_else(user_not_found)?;

    tracing::info!(admin_id = %admin.id, user_id = %id, is_active = req.is_active, "User status changed");
    Ok(Json(user.into()))
}

/// Deletes a user with their todos, harvest history and tokens
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    reject_self(&admin, id, "Cannot delete your own account")?;

    if !state.store.delete_user(id).await? {
        return Err(user_not_found());
    }

    tracing::info!(admin_id = %admin.id, user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Lists todos across all users
pub async fn list_todos(
    State(state): State<AppState>,
    Query(query): Query<ListTodosQuery>,
) -> ApiResult<Json<Vec<Todo>>> {
    let (skip, limit) = clamp_page(query.skip, query.limit, DEFAULT_PAGE, MAX_PAGE);
    let filter = TodoFilter {
        status: query.status,
        skip,
        limit,
        ..Default::default()
    };

    Ok(Json(state.store.list_all_todos(query.user_id, &filter).await?))
}

/// User and todo counts
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    Ok(Json(StatsResponse {
        users: state.store.user_stats().await?,
        todos: state.store.todo_stats().await?,
    }))
}

/// Deletes expired refresh, verification and reset tokens
pub async fn sweep_tokens(State(state): State<AppState>) -> ApiResult<Json<SweepResponse>> {
    let report = state.auth.sweep_expired_tokens().await?;

    Ok(Json(SweepResponse {
        refresh_tokens: report.refresh,
        email_verification_tokens: report.email_verification,
        password_reset_tokens: report.password_reset,
        total: report.total(),
    }))
}
