/// PostgreSQL store
///
/// Thin adapter from the store traits to the model query functions.
/// Multi-statement operations open a transaction and pass `&mut *tx` to the
/// same functions used for single statements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use super::{StoreError, StoreResult, TodoStore, TokenStore, UserStore};
use crate::db::pool::health_check;
use crate::models::harvest::{HarvestOutcome, HarvestRecord, LeaderboardEntry, LeaderboardPeriod};
use crate::models::todo::{NewTodo, Todo, TodoChanges, TodoFilter, TodoStats};
use crate::models::token::{RefreshTokenRecord, SingleUseKind, SingleUseToken, SweepReport};
use crate::models::user::{NewUser, User, UserFilter, UserProfileUpdate, UserRole, UserStats};

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        User::create(&self.pool, &user)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_username(&self.pool, username).await?)
    }

    async fn user_by_login(&self, identifier: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_login(&self.pool, identifier).await?)
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        Ok(User::list(&self.pool, filter).await?)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &UserProfileUpdate,
    ) -> StoreResult<Option<User>> {
        User::update_profile(&self.pool, id, changes)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<Option<User>> {
        Ok(User::set_password_hash(&self.pool, id, password_hash).await?)
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> StoreResult<Option<User>> {
        Ok(User::set_role(&self.pool, id, role).await?)
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> StoreResult<Option<User>> {
        Ok(User::set_active(&self.pool, id, is_active).await?)
    }

    async fn mark_verified(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::mark_verified(&self.pool, id).await?)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let history = HarvestRecord::delete_by_user(&mut *tx, id).await?;
        let resets = SingleUseToken::delete_by_user(&mut *tx, SingleUseKind::PasswordReset, id).await?;
        let verifications =
            SingleUseToken::delete_by_user(&mut *tx, SingleUseKind::EmailVerification, id).await?;
        let refresh = RefreshTokenRecord::delete_by_user(&mut *tx, id).await?;
        let todos = Todo::delete_by_owner(&mut *tx, id).await?;
        let deleted = User::delete(&mut *tx, id).await?;

        tx.commit().await?;

        debug!(
            user_id = %id,
            history,
            resets,
            verifications,
            refresh,
            todos,
            deleted,
            "Deleted user and dependent rows"
        );
        Ok(deleted)
    }

    async fn user_stats(&self) -> StoreResult<UserStats> {
        Ok(User::stats(&self.pool).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(health_check(&self.pool).await?)
    }
}

#[async_trait]
impl TodoStore for PgStore {
    async fn create_todo(&self, owner_id: Uuid, todo: NewTodo) -> StoreResult<Todo> {
        Ok(Todo::create(&self.pool, owner_id, &todo).await?)
    }

    async fn todo_for_owner(&self, id: Uuid, owner_id: Uuid) -> StoreResult<Option<Todo>> {
        Ok(Todo::find_owned(&self.pool, id, owner_id).await?)
    }

    async fn list_todos(&self, owner_id: Uuid, filter: &TodoFilter) -> StoreResult<Vec<Todo>> {
        Ok(Todo::list(&self.pool, Some(owner_id), filter).await?)
    }

    async fn list_all_todos(
        &self,
        owner_id: Option<Uuid>,
        filter: &TodoFilter,
    ) -> StoreResult<Vec<Todo>> {
        Ok(Todo::list(&self.pool, owner_id, filter).await?)
    }

    async fn update_todo(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: &TodoChanges,
    ) -> StoreResult<Option<Todo>> {
        Ok(Todo::update_owned(&self.pool, id, owner_id, changes).await?)
    }

    async fn delete_todo(&self, id: Uuid, owner_id: Uuid) -> StoreResult<bool> {
        Ok(Todo::delete_owned(&self.pool, id, owner_id).await?)
    }

    async fn harvest_completed(&self, owner_id: Uuid) -> StoreResult<HarvestOutcome> {
        let mut tx = self.pool.begin().await?;

        // Lock the user row so concurrent harvests serialize on the counter
        let current: Option<i64> = sqlx::query_scalar(
            "SELECT total_completed_count FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        };

        let harvested = Todo::delete_completed(&mut *tx, owner_id).await? as i64;

        let total = if harvested > 0 {
            HarvestRecord::insert(&mut *tx, owner_id, harvested).await?;
            User::add_completed(&mut *tx, owner_id, harvested)
                .await?
                .unwrap_or(current + harvested)
        } else {
            current
        };

        tx.commit().await?;

        Ok(HarvestOutcome {
            harvested,
            total_completed_count: total,
        })
    }

    async fn leaderboard(
        &self,
        period: LeaderboardPeriod,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<LeaderboardEntry>> {
        let entries = match period.window() {
            None => User::leaderboard(&self.pool, limit).await?,
            Some(window) => HarvestRecord::leaderboard_since(&self.pool, now - window, limit).await?,
        };
        Ok(entries)
    }

    async fn todo_stats(&self) -> StoreResult<TodoStats> {
        Ok(Todo::stats(&self.pool).await?)
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert_refresh(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshTokenRecord> {
        RefreshTokenRecord::insert(&self.pool, token_hash, user_id, expires_at)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn active_refresh(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshTokenRecord>> {
        Ok(RefreshTokenRecord::find_active(&self.pool, token_hash, now).await?)
    }

    async fn revoke_refresh(&self, token_hash: &str) -> StoreResult<bool> {
        Ok(RefreshTokenRecord::revoke(&self.pool, token_hash).await?)
    }

    async fn rotate_refresh(
        &self,
        old_hash: &str,
        new_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        if !RefreshTokenRecord::revoke(&mut *tx, old_hash).await? {
            tx.rollback().await?;
            return Ok(false);
        }

        RefreshTokenRecord::insert(&mut *tx, new_hash, user_id, expires_at)
            .await
            .map_err(StoreError::from_sqlx)?;

        tx.commit().await?;
        Ok(true)
    }

    async fn revoke_all_refresh(&self, user_id: Uuid) -> StoreResult<u64> {
        Ok(RefreshTokenRecord::revoke_all_for_user(&self.pool, user_id).await?)
    }

    async fn insert_single_use(
        &self,
        kind: SingleUseKind,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<SingleUseToken> {
        SingleUseToken::insert(&self.pool, kind, token_hash, user_id, expires_at)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn consume_verification(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let Some(user_id) =
            SingleUseToken::consume(&mut *tx, SingleUseKind::EmailVerification, token_hash, now)
                .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let Some(user) = User::mark_verified(&mut *tx, user_id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        tx.commit().await?;
        Ok(Some(user))
    }

    async fn consume_password_reset(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<(User, u64)>> {
        let mut tx = self.pool.begin().await?;

        let Some(user_id) =
            SingleUseToken::consume(&mut *tx, SingleUseKind::PasswordReset, token_hash, now).await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let Some(user) = User::set_password_hash(&mut *tx, user_id, password_hash).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        let revoked = RefreshTokenRecord::revoke_all_for_user(&mut *tx, user_id).await?;

        tx.commit().await?;
        Ok(Some((user, revoked)))
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> StoreResult<SweepReport> {
        let mut tx = self.pool.begin().await?;

        let report = SweepReport {
            refresh: RefreshTokenRecord::delete_expired(&mut *tx, now).await?,
            email_verification: SingleUseToken::delete_expired(
                &mut *tx,
                SingleUseKind::EmailVerification,
                now,
            )
            .await?,
            password_reset: SingleUseToken::delete_expired(
                &mut *tx,
                SingleUseKind::PasswordReset,
                now,
            )
            .await?,
        };

        tx.commit().await?;

        info!(
            refresh = report.refresh,
            email_verification = report.email_verification,
            password_reset = report.password_reset,
            "Swept expired tokens"
        );
        Ok(report)
    }
}
