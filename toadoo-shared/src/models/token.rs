/// Persisted token records
///
/// Three tables hold server-side token state, all keyed by the SHA-256 digest
/// of the token text (see `auth::opaque::hash_token`):
///
/// - `refresh_tokens`: one row per issued refresh JWT, revocable
/// - `email_verification_tokens`: single-use, consumed by marking `used`
/// - `password_reset_tokens`: single-use, consumed by marking `used`
///
/// A row is *active* (refresh) or *usable* (single-use) only while it is
/// unconsumed and `expires_at` lies in the future.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;
use uuid::Uuid;

/// Kind of single-use token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleUseKind {
    /// Proves ownership of the account's email address
    EmailVerification,

    /// Authorizes one password reset
    PasswordReset,
}

impl SingleUseKind {
    /// Backing table
    pub fn table(&self) -> &'static str {
        match self {
            SingleUseKind::EmailVerification => "email_verification_tokens",
            SingleUseKind::PasswordReset => "password_reset_tokens",
        }
    }
}

/// Server-side record of an issued refresh token
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Whether the token can still be exchanged at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

/// Email verification or password reset token record
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SingleUseToken {
    pub id: Uuid,
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl SingleUseToken {
    /// Whether the token can still be consumed at `now`
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at > now
    }
}

/// Rows removed by an expired-token sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub refresh: u64,
    pub email_verification: u64,
    pub password_reset: u64,
}

impl SweepReport {
    /// Total rows removed
    pub fn total(&self) -> u64 {
        self.refresh + self.email_verification + self.password_reset
    }
}

impl RefreshTokenRecord {
    /// Stores a new refresh token digest
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            INSERT INTO refresh_tokens (id, token_hash, user_id, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, token_hash, user_id, expires_at, revoked, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(executor)
        .await
    }

    /// Finds a refresh token that is neither revoked nor expired
    pub async fn find_active<'e, E: PgExecutor<'e>>(
        executor: E,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            SELECT id, token_hash, user_id, expires_at, revoked, created_at
            FROM refresh_tokens
            WHERE token_hash = $1 AND revoked = FALSE AND expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(executor)
        .await
    }

    /// Revokes a token if it is still unrevoked
    ///
    /// Returns `true` only for the call that flipped the flag, which makes
    /// this the compare-and-set step of refresh rotation.
    pub async fn revoke<'e, E: PgExecutor<'e>>(
        executor: E,
        token_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE token_hash = $1 AND revoked = FALSE",
        )
        .bind(token_hash)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revokes every outstanding refresh token of a user
    pub async fn revoke_all_for_user<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes rows that expired before `now`
    pub async fn delete_expired<'e, E: PgExecutor<'e>>(
        executor: E,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes all rows of a user
    pub async fn delete_by_user<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}

impl SingleUseToken {
    /// Stores a new single-use token digest
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        kind: SingleUseKind,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO {} (id, token_hash, user_id, expires_at) VALUES ($1, $2, $3, $4) \
             RETURNING id, token_hash, user_id, expires_at, used, created_at",
            kind.table()
        );

        sqlx::query_as::<_, SingleUseToken>(&query)
            .bind(Uuid::new_v4())
            .bind(token_hash)
            .bind(user_id)
            .bind(expires_at)
            .fetch_one(executor)
            .await
    }

    /// Consumes an unused, unexpired token in one conditional update
    ///
    /// Returns the owner's id, or `None` if the token is unknown, already used
    /// or expired. Of two concurrent calls with the same token only one gets a
    /// row back.
    pub async fn consume<'e, E: PgExecutor<'e>>(
        executor: E,
        kind: SingleUseKind,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let query = format!(
            "UPDATE {} SET used = TRUE \
             WHERE token_hash = $1 AND used = FALSE AND expires_at > $2 \
             RETURNING user_id",
            kind.table()
        );

        sqlx::query_scalar::<_, Uuid>(&query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(executor)
            .await
    }

    /// Deletes rows that expired before `now`
    pub async fn delete_expired<'e, E: PgExecutor<'e>>(
        executor: E,
        kind: SingleUseKind,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let query = format!("DELETE FROM {} WHERE expires_at < $1", kind.table());

        let result = sqlx::query(&query).bind(now).execute(executor).await?;

        Ok(result.rows_affected())
    }

    /// Deletes all rows of a user
    pub async fn delete_by_user<'e, E: PgExecutor<'e>>(
        executor: E,
        kind: SingleUseKind,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let query = format!("DELETE FROM {} WHERE user_id = $1", kind.table());

        let result = sqlx::query(&query).bind(user_id).execute(executor).await?;

        Ok(result.rows_affected())
    }
}
