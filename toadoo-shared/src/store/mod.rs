/// Persistence seams
///
/// Services talk to storage only through the traits in this module. Two
/// implementations exist:
///
/// - [`PgStore`](postgres::PgStore): PostgreSQL, used by the server and CLI
/// - [`MemoryStore`](memory::MemoryStore): in-process tables, used by tests
///
/// Both enforce the same uniqueness rules and run each read-modify-write
/// operation (refresh rotation, harvest, user deletion) atomically.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use toadoo_shared::store::{memory::MemoryStore, Store};
///
/// let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
/// # let _ = store;
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::harvest::{HarvestOutcome, LeaderboardEntry, LeaderboardPeriod};
use crate::models::todo::{NewTodo, Todo, TodoChanges, TodoFilter, TodoStats};
use crate::models::token::{RefreshTokenRecord, SingleUseKind, SingleUseToken, SweepReport};
use crate::models::user::{NewUser, User, UserFilter, UserProfileUpdate, UserRole, UserStats};

pub mod memory;
pub mod postgres;

/// Storage failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write; carries the field name
    #[error("{0} already exists")]
    Conflict(&'static str),

    /// Driver or database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Translates unique violations into `Conflict`, naming the field
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let field = match db_err.constraint() {
                    Some("users_email_key") => "email",
                    Some("users_username_key") => "username",
                    _ => "token",
                };
                return StoreError::Conflict(field);
            }
        }
        StoreError::Database(err)
    }
}

/// Result alias for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// User persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user; `Conflict("email" | "username")` when taken
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Lookup by already-normalized email
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Username (exact) or email (normalized) lookup used by login
    async fn user_by_login(&self, identifier: &str) -> StoreResult<Option<User>>;

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>>;

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &UserProfileUpdate,
    ) -> StoreResult<Option<User>>;

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<Option<User>>;

    async fn set_role(&self, id: Uuid, role: UserRole) -> StoreResult<Option<User>>;

    async fn set_active(&self, id: Uuid, is_active: bool) -> StoreResult<Option<User>>;

    async fn mark_verified(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Deletes the user and everything the user owns, atomically
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;

    async fn user_stats(&self) -> StoreResult<UserStats>;

    /// Cheap liveness probe for health checks
    async fn ping(&self) -> StoreResult<()>;
}

/// Todo, harvest and leaderboard persistence
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn create_todo(&self, owner_id: Uuid, todo: NewTodo) -> StoreResult<Todo>;

    /// `None` when missing or owned by someone else
    async fn todo_for_owner(&self, id: Uuid, owner_id: Uuid) -> StoreResult<Option<Todo>>;

    async fn list_todos(&self, owner_id: Uuid, filter: &TodoFilter) -> StoreResult<Vec<Todo>>;

    /// Unscoped listing for admins, optionally narrowed to one owner
    async fn list_all_todos(
        &self,
        owner_id: Option<Uuid>,
        filter: &TodoFilter,
    ) -> StoreResult<Vec<Todo>>;

    async fn update_todo(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: &TodoChanges,
    ) -> StoreResult<Option<Todo>>;

    async fn delete_todo(&self, id: Uuid, owner_id: Uuid) -> StoreResult<bool>;

    /// Deletes the owner's completed todos, credits the lifetime counter and
    /// appends a history row, all or nothing
    async fn harvest_completed(&self, owner_id: Uuid) -> StoreResult<HarvestOutcome>;

    async fn leaderboard(
        &self,
        period: LeaderboardPeriod,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<LeaderboardEntry>>;

    async fn todo_stats(&self) -> StoreResult<TodoStats>;
}

/// Token persistence; every `token_hash` is a SHA-256 hex digest
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert_refresh(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshTokenRecord>;

    /// Unrevoked and unexpired refresh token
    async fn active_refresh(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshTokenRecord>>;

    /// Idempotent; `true` only if this call revoked it
    async fn revoke_refresh(&self, token_hash: &str) -> StoreResult<bool>;

    /// Revokes `old_hash` and stores `new_hash` atomically
    ///
    /// Returns `false` without storing anything if `old_hash` was already
    /// revoked, so concurrent rotations of one token yield one winner.
    async fn rotate_refresh(
        &self,
        old_hash: &str,
        new_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn revoke_all_refresh(&self, user_id: Uuid) -> StoreResult<u64>;

    async fn insert_single_use(
        &self,
        kind: SingleUseKind,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<SingleUseToken>;

    /// Consumes a verification token and marks its owner verified, atomically
    ///
    /// `None` when the token is unknown, used or expired, or when its owner no
    /// longer exists; in every `None` case nothing is written.
    async fn consume_verification(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>>;

    /// Consumes a reset token, stores `password_hash` and revokes every
    /// refresh token of the owner, atomically
    ///
    /// Returns the updated user and the number of refresh tokens revoked.
    /// `None` under the same conditions as [`TokenStore::consume_verification`].
    async fn consume_password_reset(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<(User, u64)>>;

    /// Hard-deletes rows of every token kind that expired before `now`
    async fn sweep_expired(&self, now: DateTime<Utc>) -> StoreResult<SweepReport>;
}

/// Everything the services need
pub trait Store: UserStore + TodoStore + TokenStore {}

impl<T: UserStore + TodoStore + TokenStore> Store for T {}

/// Clamps pagination to `0..` skip and `1..=max` limit
pub fn clamp_page(skip: Option<i64>, limit: Option<i64>, default: i64, max: i64) -> (i64, i64) {
    let skip = skip.unwrap_or(0).max(0);
    let limit = limit.unwrap_or(default).clamp(1, max);
    (skip, limit)
}
