/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use toadoo_api::{app::AppState, config::Config};
/// use toadoo_shared::db::pool::create_pool;
/// use toadoo_shared::mailer::LogMailer;
/// use toadoo_shared::store::postgres::PgStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.pool_config()).await?;
/// let mailer = Arc::new(LogMailer::new(config.email.enabled, config.email.from.clone()));
/// let state = AppState::new(Arc::new(PgStore::new(pool)), mailer, config)?;
/// let app = toadoo_api::app::build_router(state);
/// # let _ = app;
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{auth, security},
    routes,
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use toadoo_shared::auth::guard::AccessGuard;
use toadoo_shared::auth::jwt::JwtError;
use toadoo_shared::auth::password::CredentialHasher;
use toadoo_shared::auth::service::AuthService;
use toadoo_shared::mailer::Mailer;
use toadoo_shared::store::Store;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into every handler; all fields are cheap `Arc` clones.
#[derive(Clone)]
pub struct AppState {
    /// Persistence
    pub store: Arc<dyn Store>,

    /// Account and session flows
    pub auth: AuthService,

    /// Bearer credential resolution
    pub guard: AccessGuard,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the services together from configuration
    ///
    /// # Errors
    ///
    /// Fails if the configured signing algorithm is not supported.
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, config: Config) -> Result<Self, JwtError> {
        let codec = config.token_codec()?;
        let auth = AuthService::new(
            store.clone(),
            codec.clone(),
            CredentialHasher::new(config.argon2),
            mailer,
            config.token_lifetimes(),
        );

        Ok(Self {
            guard: AccessGuard::new(store.clone(), codec),
            store,
            auth,
            config: Arc::new(config),
        })
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET  /                       # Welcome (optional auth)
/// ├── GET  /health                 # Health check
/// └── /api
///     ├── /auth                    # register, login, refresh, logout, me,
///     │                            # verify-email, resend-verification,
///     │                            # forgot-password, reset-password
///     ├── /users/me                # profile, change-password, delete (active)
///     ├── /todos                   # owner-scoped CRUD, harvest, leaderboard
///     └── /admin                   # users, todos, stats, maintenance (admin)
/// ```
///
/// Guards are attached with `route_layer`, so unknown paths still answer 404
/// rather than 401.
pub fn build_router(state: AppState) -> Router {
    let auth_public = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/verify-email", post(routes::auth::verify_email))
        .route("/forgot-password", post(routes::auth::forgot_password))
        .route("/reset-password", post(routes::auth::reset_password));

    let auth_session = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/me", get(routes::auth::me))
        .route_layer(from_fn_with_state(state.clone(), auth::require_active));

    let auth_unverified = Router::new()
        .route("/resend-verification", post(routes::auth::resend_verification))
        .route_layer(from_fn_with_state(state.clone(), auth::require_authenticated));

    let user_routes = Router::new()
        .route(
            "/me",
            get(routes::users::get_profile)
                .put(routes::users::update_profile)
                .delete(routes::users::delete_account),
        )
        .route("/me/change-password", post(routes::users::change_password))
        .route_layer(from_fn_with_state(state.clone(), auth::require_active));

    let todo_routes = Router::new()
        .route("/", post(routes::todos::create_todo).get(routes::todos::list_todos))
        .route("/harvest-completed", post(routes::todos::harvest_completed))
        .route("/leaderboard", get(routes::todos::leaderboard))
        .route(
            "/:id",
            get(routes::todos::get_todo)
                .put(routes::todos::update_todo)
                .delete(routes::todos::delete_todo),
        )
        .route_layer(from_fn_with_state(state.clone(), auth::require_todo_access));

    let admin_routes = Router::new()
        .route("/users", get(routes::admin::list_users))
        .route(
            "/users/:id",
            get(routes::admin::get_user).delete(routes::admin::delete_user),
        )
        .route("/users/:id/role", put(routes::admin::update_role))
        .route("/users/:id/status", put(routes::admin::update_status))
        .route("/todos", get(routes::admin::list_todos))
        .route("/stats", get(routes::admin::stats))
        .route("/maintenance/sweep-tokens", post(routes::admin::sweep_tokens))
        .route_layer(from_fn_with_state(state.clone(), auth::require_admin));

    let api_routes = Router::new()
        .nest("/auth", auth_public.merge(auth_session).merge(auth_unverified))
        .nest("/users", user_routes)
        .nest("/todos", todo_routes)
        .nest("/admin", admin_routes);

    let root_routes = Router::new()
        .route("/", get(routes::health::root))
        .route_layer(from_fn_with_state(state.clone(), auth::optional_user))
        .route("/health", get(routes::health::health_check));

    Router::new()
        .merge(root_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(from_fn_with_state(
            state.config.api.production,
            security::security_headers,
        ))
        .with_state(state)
}

/// CORS from the configured allow-list; `*` is permissive
fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_permissive() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
