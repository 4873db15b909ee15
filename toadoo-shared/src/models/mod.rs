/// Domain models for toadoo
///
/// Each model owns its SQL. Query functions are generic over
/// `sqlx::PgExecutor`, so `PgStore` can run several of them inside one
/// transaction.
///
/// # Models
///
/// - `user`: accounts, roles, lifecycle flags and the lifetime counter
/// - `todo`: owner-scoped todo items
/// - `token`: refresh, email verification and password reset token records
/// - `harvest`: harvest history and leaderboard rows
///
/// # Example
///
/// ```no_run
/// use toadoo_shared::models::user::{NewUser, User};
/// use toadoo_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(
///     &pool,
///     &NewUser {
///         email: "user@example.com".to_string(),
///         username: "user".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///     },
/// )
/// .await?;
/// assert!(!user.is_verified);
/// # Ok(())
/// # }
/// ```

pub mod harvest;
pub mod todo;
pub mod token;
pub mod user;
