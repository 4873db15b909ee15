/// In-memory store
///
/// All tables sit behind one `tokio::sync::Mutex`, so every trait method is a
/// single critical section and multi-step operations are atomic. Listing
/// order is insertion order, which matches the `created_at, id` ordering of
/// the PostgreSQL store for rows created in sequence.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{StoreError, StoreResult, TodoStore, TokenStore, UserStore};
use crate::models::harvest::{HarvestOutcome, HarvestRecord, LeaderboardEntry, LeaderboardPeriod};
use crate::models::todo::{NewTodo, Todo, TodoChanges, TodoFilter, TodoStats, TodoStatus};
use crate::models::token::{RefreshTokenRecord, SingleUseKind, SingleUseToken, SweepReport};
use crate::models::user::{
    normalize_email, NewUser, User, UserFilter, UserProfileUpdate, UserRole, UserStats,
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    todos: Vec<Todo>,
    refresh: HashMap<String, RefreshTokenRecord>,
    single_use: HashMap<(SingleUseKind, String), SingleUseToken>,
    harvests: Vec<HarvestRecord>,
}

impl Tables {
    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    fn update_user(&mut self, id: Uuid, change: impl FnOnce(&mut User)) -> Option<User> {
        let user = self.user_mut(id)?;
        change(user);
        user.updated_at = Utc::now();
        Some(user.clone())
    }

    fn usable_owner(&self, kind: SingleUseKind, token_hash: &str, now: DateTime<Utc>) -> Option<Uuid> {
        self.single_use
            .get(&(kind, token_hash.to_string()))
            .filter(|t| t.is_usable(now))
            .map(|t| t.user_id)
    }

    fn mark_used(&mut self, kind: SingleUseKind, token_hash: &str) {
        if let Some(token) = self.single_use.get_mut(&(kind, token_hash.to_string())) {
            token.used = true;
        }
    }

    fn revoke_all(&mut self, user_id: Uuid) -> u64 {
        let mut count = 0;
        for record in self.refresh.values_mut() {
            if record.user_id == user_id && !record.revoked {
                record.revoked = true;
                count += 1;
            }
        }
        count
    }

    fn check_unique(&self, id: Option<Uuid>, email: Option<&str>, username: Option<&str>) -> StoreResult<()> {
        let others = self.users.iter().filter(|u| Some(u.id) != id);
        for user in others {
            if email.is_some_and(|e| user.email == e) {
                return Err(StoreError::Conflict("email"));
            }
            if username.is_some_and(|n| user.username == n) {
                return Err(StoreError::Conflict("username"));
            }
        }
        Ok(())
    }
}

fn page<T: Clone>(rows: impl Iterator<Item = T>, skip: i64, limit: i64) -> Vec<T> {
    rows.skip(skip.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

/// Store that keeps everything in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Harvest history rows of one user, oldest first
    pub async fn harvest_history(&self, user_id: Uuid) -> Vec<HarvestRecord> {
        let tables = self.tables.lock().await;
        tables
            .harvests
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Backdates a harvest row, for leaderboard window tests
    pub async fn record_harvest_at(&self, user_id: Uuid, count: i64, at: DateTime<Utc>) {
        let mut tables = self.tables.lock().await;
        tables.harvests.push(HarvestRecord {
            id: Uuid::new_v4(),
            user_id,
            count,
            harvested_at: at,
        });
    }

    /// Number of refresh token rows, revoked or not
    pub async fn refresh_token_count(&self) -> usize {
        self.tables.lock().await.refresh.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        tables.check_unique(None, Some(&user.email), Some(&user.username))?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            role: UserRole::User,
            is_active: true,
            is_verified: false,
            total_completed_count: 0,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn user_by_login(&self, identifier: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        let email = normalize_email(identifier);

        let found = tables
            .users
            .iter()
            .find(|u| u.username == identifier)
            .or_else(|| tables.users.iter().find(|u| u.email == email));
        Ok(found.cloned())
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let tables = self.tables.lock().await;
        let rows = tables.users.iter().filter(|u| {
            filter.is_active.map_or(true, |a| u.is_active == a)
                && filter.role.map_or(true, |r| u.role == r)
        });
        Ok(page(rows.cloned(), filter.skip, filter.limit))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &UserProfileUpdate,
    ) -> StoreResult<Option<User>> {
        let mut tables = self.tables.lock().await;
        tables.check_unique(Some(id), changes.email.as_deref(), changes.username.as_deref())?;

        Ok(tables.update_user(id, |user| {
            if let Some(email) = &changes.email {
                user.email = email.clone();
            }
            if let Some(username) = &changes.username {
                user.username = username.clone();
            }
        }))
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<Option<User>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.update_user(id, |u| u.password_hash = password_hash.to_string()))
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> StoreResult<Option<User>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.update_user(id, |u| u.role = role))
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> StoreResult<Option<User>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.update_user(id, |u| u.is_active = is_active))
    }

    async fn mark_verified(&self, id: Uuid) -> StoreResult<Option<User>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.update_user(id, |u| u.is_verified = true))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;

        tables.harvests.retain(|h| h.user_id != id);
        tables.single_use.retain(|_, t| t.user_id != id);
        tables.refresh.retain(|_, t| t.user_id != id);
        tables.todos.retain(|t| t.owner_id != id);

        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        Ok(tables.users.len() < before)
    }

    async fn user_stats(&self) -> StoreResult<UserStats> {
        let tables = self.tables.lock().await;
        let total = tables.users.len() as i64;
        let active = tables.users.iter().filter(|u| u.is_active).count() as i64;
        let admins = tables.users.iter().filter(|u| u.is_admin()).count() as i64;

        Ok(UserStats {
            total,
            active,
            admins,
            inactive: total - active,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn create_todo(&self, owner_id: Uuid, todo: NewTodo) -> StoreResult<Todo> {
        let mut tables = self.tables.lock().await;
        if !tables.users.iter().any(|u| u.id == owner_id) {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }

        let now = Utc::now();
        let todo = Todo {
            id: Uuid::new_v4(),
            owner_id,
            title: todo.title,
            description: todo.description,
            status: todo.status,
            priority: todo.priority,
            due_date: todo.due_date,
            created_at: now,
            updated_at: now,
        };
        tables.todos.push(todo.clone());
        Ok(todo)
    }

    async fn todo_for_owner(&self, id: Uuid, owner_id: Uuid) -> StoreResult<Option<Todo>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .todos
            .iter()
            .find(|t| t.id == id && t.owner_id == owner_id)
            .cloned())
    }

    async fn list_todos(&self, owner_id: Uuid, filter: &TodoFilter) -> StoreResult<Vec<Todo>> {
        self.list_all_todos(Some(owner_id), filter).await
    }

    async fn list_all_todos(
        &self,
        owner_id: Option<Uuid>,
        filter: &TodoFilter,
    ) -> StoreResult<Vec<Todo>> {
        let tables = self.tables.lock().await;
        let rows = tables
            .todos
            .iter()
            .filter(|t| owner_id.map_or(true, |o| t.owner_id == o) && filter.matches(t));
        Ok(page(rows.cloned(), filter.skip, filter.limit))
    }

    async fn update_todo(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: &TodoChanges,
    ) -> StoreResult<Option<Todo>> {
        let mut tables = self.tables.lock().await;
        let Some(todo) = tables
            .todos
            .iter_mut()
            .find(|t| t.id == id && t.owner_id == owner_id)
        else {
            return Ok(None);
        };

        changes.apply(todo);
        todo.updated_at = Utc::now();
        Ok(Some(todo.clone()))
    }

    async fn delete_todo(&self, id: Uuid, owner_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.todos.len();
        tables
            .todos
            .retain(|t| !(t.id == id && t.owner_id == owner_id));
        Ok(tables.todos.len() < before)
    }

    async fn harvest_completed(&self, owner_id: Uuid) -> StoreResult<HarvestOutcome> {
        let mut tables = self.tables.lock().await;
        if !tables.users.iter().any(|u| u.id == owner_id) {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }

        let before = tables.todos.len();
        tables
            .todos
            .retain(|t| !(t.owner_id == owner_id && t.status == TodoStatus::Completed));
        let harvested = (before - tables.todos.len()) as i64;

        if harvested > 0 {
            tables.harvests.push(HarvestRecord {
                id: Uuid::new_v4(),
                user_id: owner_id,
                count: harvested,
                harvested_at: Utc::now(),
            });
            tables.update_user(owner_id, |u| u.total_completed_count += harvested);
        }

        let total = tables
            .users
            .iter()
            .find(|u| u.id == owner_id)
            .map_or(0, |u| u.total_completed_count);

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
        let tables = self.tables.lock().await;
        let active = tables.users.iter().filter(|u| u.is_active);

        let mut rows: Vec<(Uuid, String, i64)> = match period.window() {
            None => active
                .map(|u| (u.id, u.username.clone(), u.total_completed_count))
                .collect(),
            Some(window) => {
                let since = now - window;
                active
                    .map(|u| {
                        let score = tables
                            .harvests
                            .iter()
                            .filter(|h| h.user_id == u.id && h.harvested_at >= since)
                            .map(|h| h.count)
                            .sum();
                        (u.id, u.username.clone(), score)
                    })
                    .collect()
            }
        };

        rows.retain(|(_, _, score)| *score > 0);
        rows.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.1.cmp(&b.1)));
        rows.truncate(limit.max(0) as usize);

        Ok(LeaderboardEntry::ranked(rows))
    }

    async fn todo_stats(&self) -> StoreResult<TodoStats> {
        let tables = self.tables.lock().await;
        let count = |status: TodoStatus| {
            tables.todos.iter().filter(|t| t.status == status).count() as i64
        };

        Ok(TodoStats {
            total: tables.todos.len() as i64,
            pending: count(TodoStatus::Pending),
            in_progress: count(TodoStatus::InProgress),
            completed: count(TodoStatus::Completed),
        })
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_refresh(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshTokenRecord> {
        let mut tables = self.tables.lock().await;
        if tables.refresh.contains_key(token_hash) {
            return Err(StoreError::Conflict("token"));
        }

        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            token_hash: token_hash.to_string(),
            user_id,
            expires_at,
            revoked: false,
            created_at: Utc::now(),
        };
        tables.refresh.insert(token_hash.to_string(), record.clone());
        Ok(record)
    }

    async fn active_refresh(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshTokenRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .refresh
            .get(token_hash)
            .filter(|r| r.is_active(now))
            .cloned())
    }

    async fn revoke_refresh(&self, token_hash: &str) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.refresh.get_mut(token_hash) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rotate_refresh(
        &self,
        old_hash: &str,
        new_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.refresh.contains_key(new_hash) {
            return Err(StoreError::Conflict("token"));
        }

        match tables.refresh.get_mut(old_hash) {
            Some(record) if !record.revoked => record.revoked = true,
            _ => return Ok(false),
        }

        tables.refresh.insert(
            new_hash.to_string(),
            RefreshTokenRecord {
                id: Uuid::new_v4(),
                token_hash: new_hash.to_string(),
                user_id,
                expires_at,
                revoked: false,
                created_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn revoke_all_refresh(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        Ok(tables.revoke_all(user_id))
    }

    async fn insert_single_use(
        &self,
        kind: SingleUseKind,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<SingleUseToken> {
        let mut tables = self.tables.lock().await;
        let key = (kind, token_hash.to_string());
        if tables.single_use.contains_key(&key) {
            return Err(StoreError::Conflict("token"));
        }

        let token = SingleUseToken {
            id: Uuid::new_v4(),
            token_hash: token_hash.to_string(),
            user_id,
            expires_at,
            used: false,
            created_at: Utc::now(),
        };
        tables.single_use.insert(key, token.clone());
        Ok(token)
    }

    async fn consume_verification(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let mut tables = self.tables.lock().await;
        let Some(user_id) = tables.usable_owner(SingleUseKind::EmailVerification, token_hash, now)
        else {
            return Ok(None);
        };

        let user = tables.update_user(user_id, |u| u.is_verified = true);
        if user.is_some() {
            tables.mark_used(SingleUseKind::EmailVerification, token_hash);
        }
        Ok(user)
    }

    async fn consume_password_reset(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<(User, u64)>> {
        let mut tables = self.tables.lock().await;
        let Some(user_id) = tables.usable_owner(SingleUseKind::PasswordReset, token_hash, now) else {
            return Ok(None);
        };

        let Some(user) =
            tables.update_user(user_id, |u| u.password_hash = password_hash.to_string())
        else {
            return Ok(None);
        };
        tables.mark_used(SingleUseKind::PasswordReset, token_hash);

        let revoked = tables.revoke_all(user_id);
        Ok(Some((user, revoked)))
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> StoreResult<SweepReport> {
        let mut tables = self.tables.lock().await;
        let mut report = SweepReport::default();

        let before = tables.refresh.len();
        tables.refresh.retain(|_, r| r.expires_at >= now);
        report.refresh = (before - tables.refresh.len()) as u64;

        tables.single_use.retain(|(kind, _), t| {
            let keep = t.expires_at >= now;
            if !keep {
                match kind {
                    SingleUseKind::EmailVerification => report.email_verification += 1,
                    SingleUseKind::PasswordReset => report.password_reset += 1,
                }
            }
            keep
        });

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            email: format!("{}@example.com", name),
            username: name.to_string(),
            password_hash: "$argon2id$stub".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_user_defaults() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("alice")).await.unwrap();

        assert_eq!(user.role, UserRole::User);
        assert!(user.is_active);
        assert!(!user.is_verified);
        assert_eq!(user.total_completed_count, 0);
    }

    #[tokio::test]
    async fn test_unique_email_and_username() {
        let store = MemoryStore::new();
        store.create_user(new_user("alice")).await.unwrap();

        let mut same_email = new_user("other");
        same_email.email = "alice@example.com".to_string();
        assert!(matches!(
            store.create_user(same_email).await,
            Err(StoreError::Conflict("email"))
        ));

        let mut same_name = new_user("alice");
        same_name.email = "fresh@example.com".to_string();
        assert!(matches!(
            store.create_user(same_name).await,
            Err(StoreError::Conflict("username"))
        ));
    }

    #[tokio::test]
    async fn test_profile_update_conflict_excludes_self() {
        let store = MemoryStore::new();
        let alice = store.create_user(new_user("alice")).await.unwrap();
        store.create_user(new_user("bob")).await.unwrap();

        let same = UserProfileUpdate {
            username: Some("alice".to_string()),
            ..Default::default()
        };
        assert!(store.update_profile(alice.id, &same).await.unwrap().is_some());

        let taken = UserProfileUpdate {
            username: Some("bob".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_profile(alice.id, &taken).await,
            Err(StoreError::Conflict("username"))
        ));
    }

    #[tokio::test]
    async fn test_login_lookup_prefers_username() {
        let store = MemoryStore::new();
        let alice = store.create_user(new_user("alice")).await.unwrap();

        let by_name = store.user_by_login("alice").await.unwrap().unwrap();
        let by_email = store.user_by_login("ALICE@example.com").await.unwrap().unwrap();
        assert_eq!(by_name.id, alice.id);
        assert_eq!(by_email.id, alice.id);
        assert!(store.user_by_login("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotation_single_winner() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("alice")).await.unwrap();
        let exp = Utc::now() + Duration::days(7);

        store.insert_refresh("old", user.id, exp).await.unwrap();
        assert!(store.rotate_refresh("old", "new1", user.id, exp).await.unwrap());
        assert!(!store.rotate_refresh("old", "new2", user.id, exp).await.unwrap());

        let now = Utc::now();
        assert!(store.active_refresh("old", now).await.unwrap().is_none());
        assert!(store.active_refresh("new1", now).await.unwrap().is_some());
        assert!(store.active_refresh("new2", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_password_reset_consume_is_atomic_and_one_shot() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("alice")).await.unwrap();
        let now = Utc::now();

        store
            .insert_refresh("session", user.id, now + Duration::days(7))
            .await
            .unwrap();
        store
            .insert_single_use(SingleUseKind::PasswordReset, "reset", user.id, now + Duration::hours(1))
            .await
            .unwrap();
        store
            .insert_single_use(SingleUseKind::PasswordReset, "stale", user.id, now - Duration::hours(1))
            .await
            .unwrap();

        assert!(store
            .consume_password_reset("stale", "$argon2id$stale", now)
            .await
            .unwrap()
            .is_none());

        let (updated, revoked) = store
            .consume_password_reset("reset", "$argon2id$new", now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.password_hash, "$argon2id$new");
        assert_eq!(revoked, 1);
        assert!(store.active_refresh("session", now).await.unwrap().is_none());

        assert!(store
            .consume_password_reset("reset", "$argon2id$again", now)
            .await
            .unwrap()
            .is_none());
        let user = store.user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.password_hash, "$argon2id$new");
    }

    #[tokio::test]
    async fn test_verification_consume_is_one_shot() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("alice")).await.unwrap();
        let now = Utc::now();

        store
            .insert_single_use(SingleUseKind::EmailVerification, "verify", user.id, now + Duration::hours(1))
            .await
            .unwrap();

        let verified = store.consume_verification("verify", now).await.unwrap().unwrap();
        assert!(verified.is_verified);
        assert!(store.consume_verification("verify", now).await.unwrap().is_none());
        assert!(store.consume_verification("unknown", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_harvest_and_delete_cascade() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("alice")).await.unwrap();

        store
            .create_todo(
                user.id,
                NewTodo {
                    title: "done".to_string(),
                    status: TodoStatus::Completed,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .create_todo(user.id, NewTodo { title: "open".to_string(), ..Default::default() })
            .await
            .unwrap();

        let outcome = store.harvest_completed(user.id).await.unwrap();
        assert_eq!(outcome.harvested, 1);
        assert_eq!(outcome.total_completed_count, 1);
        assert_eq!(store.harvest_history(user.id).await.len(), 1);

        let empty = store.harvest_completed(user.id).await.unwrap();
        assert_eq!(empty.harvested, 0);
        assert_eq!(empty.total_completed_count, 1);
        assert_eq!(store.harvest_history(user.id).await.len(), 1);

        store
            .insert_refresh("h", user.id, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        assert!(store.delete_user(user.id).await.unwrap());
        assert_eq!(store.refresh_token_count().await, 0);
        assert!(store.harvest_history(user.id).await.is_empty());
        assert!(store
            .list_all_todos(None, &TodoFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert!(!store.delete_user(user.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_counts_by_kind() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("alice")).await.unwrap();
        let now = Utc::now();
        let past = now - Duration::hours(1);
        let future = now + Duration::hours(1);

        store.insert_refresh("r1", user.id, past).await.unwrap();
        store.insert_refresh("r2", user.id, future).await.unwrap();
        store
            .insert_single_use(SingleUseKind::EmailVerification, "v1", user.id, past)
            .await
            .unwrap();
        store
            .insert_single_use(SingleUseKind::PasswordReset, "p1", user.id, past)
            .await
            .unwrap();
        store
            .insert_single_use(SingleUseKind::PasswordReset, "p2", user.id, future)
            .await
            .unwrap();

        let report = store.sweep_expired(now).await.unwrap();
        assert_eq!(report.refresh, 1);
        assert_eq!(report.email_verification, 1);
        assert_eq!(report.password_reset, 1);

        let again = store.sweep_expired(now).await.unwrap();
        assert_eq!(again.total(), 0);
    }
}
