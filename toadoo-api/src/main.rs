//! # Toadoo API Server
//!
//! Multi-user todo service with JWT sessions, email verification, password
//! reset, harvesting of completed todos and a leaderboard.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/toadoo JWT_SECRET=... cargo run -p toadoo-api
//! ```
//!
//! Set `LOG_FORMAT=json` for structured logs.

use std::sync::Arc;

use anyhow::Context;
use toadoo_api::{
    app::{build_router, AppState},
    config::Config,
};
use toadoo_shared::db::{migrations::run_migrations, pool::create_pool};
use toadoo_shared::mailer::LogMailer;
use toadoo_shared::store::postgres::PgStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "toadoo_api=debug,toadoo_shared=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("Toadoo API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Invalid configuration")?;

    let pool = create_pool(config.pool_config())
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool).await.context("Failed to run migrations")?;

    let mailer = Arc::new(LogMailer::new(config.email.enabled, config.email.from.clone()));
    let address = config.bind_address();
    let state = AppState::new(Arc::new(PgStore::new(pool)), mailer, config)?;

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
