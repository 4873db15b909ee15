/// PostgreSQL plumbing
///
/// - `pool`: connection pool with a startup health check
/// - `migrations`: embedded `sqlx` migrations from the workspace `migrations/` directory
///
/// # Example
///
/// ```no_run
/// use toadoo_shared::db::pool::{create_pool, DatabaseConfig};
/// use toadoo_shared::db::migrations::run_migrations;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     })
///     .await?;
///
///     run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
