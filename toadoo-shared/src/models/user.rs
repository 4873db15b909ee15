/// User model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     email VARCHAR(255) NOT NULL UNIQUE,        -- stored lower-cased
///     username VARCHAR(50) NOT NULL UNIQUE,      -- case-sensitive
///     password_hash VARCHAR(255) NOT NULL,
///     role user_role NOT NULL DEFAULT 'user',
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     is_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     total_completed_count BIGINT NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// All query functions take any Postgres executor, so they run equally on the
/// pool or inside a transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::harvest::LeaderboardEntry;

const USER_COLUMNS: &str = "id, email, username, password_hash, role, is_active, is_verified, \
                            total_completed_count, created_at, updated_at";

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular account
    User,

    /// Administrator with access to the unscoped admin routes
    Admin,
}

impl UserRole {
    /// Gets role as string
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

/// User account
///
/// The password hash is never serialized.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Email address, lower-cased
    pub email: String,

    /// Username, case-sensitive
    pub username: String,

    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Account role
    pub role: UserRole,

    /// Deactivated accounts cannot log in or use access tokens
    pub is_active: bool,

    /// Set once the email verification flow completes
    pub is_verified: bool,

    /// Lifetime number of harvested todos; only ever grows
    pub total_completed_count: i64,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the user holds the admin role
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Input for creating a user
///
/// New users always start as active, unverified, role `user`.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Normalized email
    pub email: String,

    /// Username
    pub username: String,

    /// Argon2id hash (never plaintext)
    pub password_hash: String,
}

/// Self-service profile changes; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct UserProfileUpdate {
    /// New normalized email
    pub email: Option<String>,

    /// New username
    pub username: Option<String>,
}

/// Admin listing filter
#[derive(Debug, Clone)]
pub struct UserFilter {
    /// Only users with this active flag
    pub is_active: Option<bool>,

    /// Only users with this role
    pub role: Option<UserRole>,

    /// Rows to skip
    pub skip: i64,

    /// Maximum rows to return
    pub limit: i64,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            is_active: None,
            role: None,
            skip: 0,
            limit: 100,
        }
    }
}

/// Aggregate user counts for the admin dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub admins: i64,
    pub inactive: i64,
}

/// Normalizes an email for storage and lookup
///
/// Emails are compared case-insensitively, so they are trimmed and
/// lower-cased everywhere they enter the system.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `users_email_key` or
    /// `users_username_key` when either value is taken.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: &NewUser,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (id, email, username, password_hash) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(&data.email)
            .bind(&data.username)
            .bind(&data.password_hash)
            .fetch_one(executor)
            .await
    }

    /// Finds a user by ID
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a user by (already normalized) email
    pub async fn find_by_email<'e, E: PgExecutor<'e>>(
        executor: E,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(executor)
            .await
    }

    /// Finds a user by exact username
    pub async fn find_by_username<'e, E: PgExecutor<'e>>(
        executor: E,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(executor)
            .await
    }

    /// Finds a user by username or email
    ///
    /// The username is matched exactly; the email side is normalized first.
    /// A username match wins if both would match different rows.
    pub async fn find_by_login<'e, E: PgExecutor<'e>>(
        executor: E,
        identifier: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM users WHERE username = $1 OR email = $2 \
             ORDER BY (username = $1) DESC LIMIT 1",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(identifier)
            .bind(normalize_email(identifier))
            .fetch_optional(executor)
            .await
    }

    /// Lists users, oldest first
    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        filter: &UserFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM users \
             WHERE ($1::boolean IS NULL OR is_active = $1) \
               AND ($2::user_role IS NULL OR role = $2) \
             ORDER BY created_at ASC, id ASC \
             LIMIT $3 OFFSET $4",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(filter.is_active)
            .bind(filter.role)
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(executor)
            .await
    }

    /// Applies profile changes
    ///
    /// Returns `None` when the user does not exist.
    pub async fn update_profile<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        data: &UserProfileUpdate,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET \
                email = COALESCE($2, email), \
                username = COALESCE($3, username), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(data.email.as_deref())
            .bind(data.username.as_deref())
            .fetch_optional(executor)
            .await
    }

    /// Replaces the password hash
    pub async fn set_password_hash<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        password_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(password_hash)
            .fetch_optional(executor)
            .await
    }

    /// Changes the role
    pub async fn set_role<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(role)
            .fetch_optional(executor)
            .await
    }

    /// Activates or deactivates the account
    pub async fn set_active<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(is_active)
            .fetch_optional(executor)
            .await
    }

    /// Marks the email address as verified
    pub async fn mark_verified<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Adds harvested todos to the lifetime counter, returning the new total
    pub async fn add_completed<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        count: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
            SET total_completed_count = total_completed_count + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING total_completed_count
            "#,
        )
        .bind(id)
        .bind(count)
        .fetch_optional(executor)
        .await
    }

    /// Deletes the user row only
    ///
    /// Dependent rows must already be gone; see `PgStore::delete_user`.
    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts users by state and role
    pub async fn stats<'e, E: PgExecutor<'e>>(executor: E) -> Result<UserStats, sqlx::Error> {
        let (total, active, admins): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE is_active),
                   COUNT(*) FILTER (WHERE role = 'admin')
            FROM users
            "#,
        )
        .fetch_one(executor)
        .await?;

        Ok(UserStats {
            total,
            active,
            admins,
            inactive: total - active,
        })
    }

    /// All-time ranking by lifetime counter
    pub async fn leaderboard<'e, E: PgExecutor<'e>>(
        executor: E,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
        let rows: Vec<(Uuid, String, i64)> = sqlx::query_as(
            r#"
            SELECT id, username, total_completed_count
            FROM users
            WHERE is_active AND total_completed_count > 0
            ORDER BY total_completed_count DESC, username ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(executor)
        .await?;

        Ok(LeaderboardEntry::ranked(rows))
    }
}
