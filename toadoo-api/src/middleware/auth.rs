/// Authentication middleware
///
/// Each layer resolves the `Authorization: Bearer <token>` header through the
/// [`AccessGuard`](toadoo_shared::auth::guard::AccessGuard) and stores the
/// result in the request extensions:
///
/// - `require_*` layers insert [`CurrentUser`] or reject the request
/// - [`optional_user`] always inserts [`MaybeUser`]
///
/// # Example
///
/// ```no_run
/// use axum::Extension;
/// use toadoo_api::middleware::auth::CurrentUser;
///
/// async fn handler(Extension(CurrentUser(user)): Extension<CurrentUser>) -> String {
///     format!("Hello, {}!", user.username)
/// }
/// ```

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use toadoo_shared::auth::guard::{bearer_token, Requirement};
use toadoo_shared::models::user::User;

use crate::{app::AppState, error::ApiError};

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// The caller, if a valid credential was presented
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

fn credential(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
}

async fn enforce(
    state: &AppState,
    requirement: Requirement,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = state.guard.require(credential(&req), requirement).await?;
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Any valid credential, including inactive accounts
pub async fn require_authenticated(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(&state, Requirement::Authenticated, req, next).await
}

/// Valid credential for an active account
pub async fn require_active(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(&state, Requirement::Active, req, next).await
}

/// Todo endpoints: active, plus verified when `REQUIRE_VERIFIED_EMAIL` is set
pub async fn require_todo_access(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let requirement = if state.config.features.require_verified_email {
        Requirement::Verified
    } else {
        Requirement::Active
    };
    enforce(&state, requirement, req, next).await
}

/// Active administrator
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(&state, Requirement::Admin, req, next).await
}

/// Never rejects; bad or missing credentials resolve to `MaybeUser(None)`
pub async fn optional_user(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = state.guard.optional(credential(&req)).await?;
    req.extensions_mut().insert(MaybeUser(user));
    Ok(next.run(req).await)
}
