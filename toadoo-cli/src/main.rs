//! # Toadoo operator CLI
//!
//! Maintenance tasks that run outside the API server.
//!
//! ## Usage
//!
//! ```bash
//! toadoo migrate [--create-db]
//! toadoo migrate-status
//! toadoo sweep-tokens
//! toadoo promote-admin <username>
//! ```
//!
//! Every command reads `DATABASE_URL` from the environment or `.env`.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use toadoo_shared::db::migrations::{ensure_database_exists, migration_status, run_migrations};
use toadoo_shared::db::pool::{create_pool, DatabaseConfig};
use toadoo_shared::models::user::UserRole;
use toadoo_shared::store::postgres::PgStore;
use toadoo_shared::store::{TokenStore, UserStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "toadoo")]
#[command(about = "Toadoo maintenance CLI")]
#[command(version)]
struct Cli {
    /// Database URL (overrides DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending migrations
    Migrate {
        /// Create the database first if it does not exist
        #[arg(long)]
        create_db: bool,
    },
    /// Show applied and known migrations
    MigrateStatus,
    /// Delete expired refresh, verification and reset tokens
    SweepTokens,
    /// Give a user the admin role
    PromoteAdmin {
        /// Username, matched exactly
        username: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toadoo_cli=info,toadoo_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn database_url(flag: Option<String>) -> anyhow::Result<String> {
    flag.or_else(|| std::env::var("DATABASE_URL").ok())
        .context("DATABASE_URL environment variable is required")
}

async fn connect(url: &str) -> anyhow::Result<PgStore> {
    let pool = create_pool(DatabaseConfig::with_url(url))
        .await
        .context("Failed to connect to database")?;
    Ok(PgStore::new(pool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let url = database_url(cli.database_url)?;

    match cli.command {
        Commands::Migrate { create_db } => {
            if create_db {
                ensure_database_exists(&url)
                    .await
                    .context("Failed to create database")?;
            }

            let store = connect(&url).await?;
            run_migrations(store.pool())
                .await
                .context("Failed to run migrations")?;

            let status = migration_status(store.pool()).await?;
            tracing::info!(
                applied = status.applied,
                latest = ?status.latest_version,
                "Migrations applied"
            );
        }
        Commands::MigrateStatus => {
            let store = connect(&url).await?;
            let status = migration_status(store.pool()).await?;

            println!("applied: {}/{}", status.applied, status.known);
            match status.latest_version {
                Some(version) => println!("latest:  {}", version),
                None => println!("latest:  none"),
            }
            if !status.is_up_to_date() {
                println!("pending migrations; run `toadoo migrate`");
            }
        }
        Commands::SweepTokens => {
            let store = connect(&url).await?;
            let report = store.sweep_expired(Utc::now()).await?;

            tracing::info!(
                refresh = report.refresh,
                email_verification = report.email_verification,
                password_reset = report.password_reset,
                "Expired tokens swept"
            );
            println!("removed {} expired tokens", report.total());
        }
        Commands::PromoteAdmin { username } => {
            let store = connect(&url).await?;
            let user = store
                .user_by_username(&username)
                .await?
                .with_context(|| format!("No user named {}", username))?;

            if user.is_admin() {
                println!("{} is already an admin", user.username);
                return Ok(());
            }

            store
                .set_role(user.id, UserRole::Admin)
                .await?
                .context("User disappeared during promotion")?;

            tracing::info!(user_id = %user.id, "User promoted to admin");
            println!("{} is now an admin", user.username);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_promote_admin() {
        let cli = Cli::try_parse_from(["toadoo", "promote-admin", "amy"]).unwrap();
        match cli.command {
            Commands::PromoteAdmin { username } => assert_eq!(username, "amy"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_migrate_flags() {
        let cli = Cli::try_parse_from(["toadoo", "migrate", "--create-db"]).unwrap();
        assert!(matches!(cli.command, Commands::Migrate { create_db: true }));

        let cli = Cli::try_parse_from([
            "toadoo",
            "sweep-tokens",
            "--database-url",
            "postgresql://localhost/toadoo",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::SweepTokens));
        assert_eq!(cli.database_url.as_deref(), Some("postgresql://localhost/toadoo"));
    }

    #[test]
    fn test_promote_requires_username() {
        assert!(Cli::try_parse_from(["toadoo", "promote-admin"]).is_err());
    }

    #[test]
    fn test_database_url_flag_wins() {
        let url = database_url(Some("postgresql://flag/db".to_string())).unwrap();
        assert_eq!(url, "postgresql://flag/db");
    }
}
