/// Todo model and database operations
///
/// Every user-facing query is scoped by `owner_id`: a todo that belongs to
/// someone else is indistinguishable from one that does not exist. Only the
/// admin listing (`Todo::list` with `owner_id: None`) crosses owners.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE todos (
///     id UUID PRIMARY KEY,
///     owner_id UUID NOT NULL REFERENCES users (id),
///     title VARCHAR(200) NOT NULL,
///     description TEXT,
///     status todo_status NOT NULL DEFAULT 'pending',
///     priority todo_priority NOT NULL DEFAULT 'medium',
///     due_date TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

const TODO_COLUMNS: &str =
    "id, owner_id, title, description, status, priority, due_date, created_at, updated_at";

/// Maximum title length in characters
pub const MAX_TITLE_LENGTH: usize = 200;

/// Todo status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "todo_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    /// Not started
    #[default]
    Pending,

    /// Being worked on
    InProgress,

    /// Done, waiting to be harvested
    Completed,
}

impl TodoStatus {
    /// Gets status as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "pending",
            TodoStatus::InProgress => "in_progress",
            TodoStatus::Completed => "completed",
        }
    }
}

/// Todo priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "todo_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TodoPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Todo item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Todo {
    /// Unique todo ID
    pub id: Uuid,

    /// Owning user
    pub owner_id: Uuid,

    /// Title, 1 to 200 characters
    pub title: String,

    /// Free-form description
    pub description: Option<String>,

    /// Workflow status
    pub status: TodoStatus,

    /// Priority
    pub priority: TodoPriority,

    /// Optional due date
    pub due_date: Option<DateTime<Utc>>,

    /// When the todo was created
    pub created_at: DateTime<Utc>,

    /// When the todo was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a todo
#[derive(Debug, Clone, Default)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,
    pub priority: TodoPriority,
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial todo update
///
/// Outer `None` leaves a field unchanged. For the nullable fields,
/// `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default)]
pub struct TodoChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl TodoChanges {
    /// Whether the update would change nothing
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }

    /// Applies the changes to an in-memory todo
    pub fn apply(&self, todo: &mut Todo) {
        if let Some(title) = &self.title {
            todo.title = title.clone();
        }
        if let Some(description) = &self.description {
            todo.description = description.clone();
        }
        if let Some(status) = self.status {
            todo.status = status;
        }
        if let Some(priority) = self.priority {
            todo.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            todo.due_date = due_date;
        }
    }
}

/// Listing filter
#[derive(Debug, Clone)]
pub struct TodoFilter {
    /// Only todos in this status
    pub status: Option<TodoStatus>,

    /// Only todos with this priority
    pub priority: Option<TodoPriority>,

    /// Only todos due at or before this instant (todos without a due date are excluded)
    pub due_before: Option<DateTime<Utc>>,

    /// Rows to skip
    pub skip: i64,

    /// Maximum rows to return
    pub limit: i64,
}

impl Default for TodoFilter {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            due_before: None,
            skip: 0,
            limit: 100,
        }
    }
}

impl TodoFilter {
    /// Whether a todo passes the status, priority and due-date predicates
    pub fn matches(&self, todo: &Todo) -> bool {
        if self.status.is_some_and(|s| s != todo.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != todo.priority) {
            return false;
        }
        if let Some(before) = self.due_before {
            match todo.due_date {
                Some(due) if due <= before => {}
                _ => return false,
            }
        }
        true
    }
}

/// Aggregate todo counts for the admin dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoStats {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
}

impl Todo {
    /// Inserts a todo for `owner_id`
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        owner_id: Uuid,
        data: &NewTodo,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO todos (id, owner_id, title, description, status, priority, due_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            TODO_COLUMNS
        );

        sqlx::query_as::<_, Todo>(&query)
            .bind(Uuid::new_v4())
            .bind(owner_id)
            .bind(&data.title)
            .bind(data.description.as_deref())
            .bind(data.status)
            .bind(data.priority)
            .bind(data.due_date)
            .fetch_one(executor)
            .await
    }

    /// Finds a todo by ID within one owner's todos
    pub async fn find_owned<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM todos WHERE id = $1 AND owner_id = $2",
            TODO_COLUMNS
        );

        sqlx::query_as::<_, Todo>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(executor)
            .await
    }

    /// Lists todos, oldest first
    ///
    /// With `owner_id` set the listing is scoped to that owner; `None` lists
    /// across all owners and must only be reachable by admins.
    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        owner_id: Option<Uuid>,
        filter: &TodoFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM todos \
             WHERE ($1::uuid IS NULL OR owner_id = $1) \
               AND ($2::todo_status IS NULL OR status = $2) \
               AND ($3::todo_priority IS NULL OR priority = $3) \
               AND ($4::timestamptz IS NULL OR due_date <= $4) \
             ORDER BY created_at ASC, id ASC \
             LIMIT $5 OFFSET $6",
            TODO_COLUMNS
        );

        sqlx::query_as::<_, Todo>(&query)
            .bind(owner_id)
            .bind(filter.status)
            .bind(filter.priority)
            .bind(filter.due_before)
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(executor)
            .await
    }

    /// Applies a partial update to an owned todo
    ///
    /// Returns `None` if the todo does not exist or belongs to someone else.
    pub async fn update_owned<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        owner_id: Uuid,
        changes: &TodoChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE todos SET \
                title = COALESCE($3, title), \
                description = CASE WHEN $4::boolean THEN $5::text ELSE description END, \
                status = COALESCE($6::todo_status, status), \
                priority = COALESCE($7::todo_priority, priority), \
                due_date = CASE WHEN $8::boolean THEN $9::timestamptz ELSE due_date END, \
                updated_at = NOW() \
             WHERE id = $1 AND owner_id = $2 RETURNING {}",
            TODO_COLUMNS
        );

        sqlx::query_as::<_, Todo>(&query)
            .bind(id)
            .bind(owner_id)
            .bind(changes.title.as_deref())
            .bind(changes.description.is_some())
            .bind(changes.description.clone().flatten())
            .bind(changes.status)
            .bind(changes.priority)
            .bind(changes.due_date.is_some())
            .bind(changes.due_date.flatten())
            .fetch_optional(executor)
            .await
    }

    /// Deletes an owned todo
    pub async fn delete_owned<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes all of an owner's completed todos, returning how many went
    pub async fn delete_completed<'e, E: PgExecutor<'e>>(
        executor: E,
        owner_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM todos WHERE owner_id = $1 AND status = 'completed'")
            .bind(owner_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes every todo of an owner
    pub async fn delete_by_owner<'e, E: PgExecutor<'e>>(
        executor: E,
        owner_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM todos WHERE owner_id = $1")
            .bind(owner_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    /// Counts todos by status
    pub async fn stats<'e, E: PgExecutor<'e>>(executor: E) -> Result<TodoStats, sqlx::Error> {
        let (total, pending, in_progress, completed): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status = 'pending'),
                   COUNT(*) FILTER (WHERE status = 'in_progress'),
                   COUNT(*) FILTER (WHERE status = 'completed')
            FROM todos
            "#,
        )
        .fetch_one(executor)
        .await?;

        Ok(TodoStats {
            total,
            pending,
            in_progress,
            completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> Todo {
        let now = Utc::now();
        Todo {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "Buy milk".to_string(),
            description: Some("2 liters".to_string()),
            status: TodoStatus::Pending,
            priority: TodoPriority::Medium,
            due_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&TodoStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        let status: TodoStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, TodoStatus::Completed);
        assert!(serde_json::from_str::<TodoStatus>("\"done\"").is_err());
    }

    #[test]
    fn test_defaults() {
        let new = NewTodo::default();
        assert_eq!(new.status, TodoStatus::Pending);
        assert_eq!(new.priority, TodoPriority::Medium);
    }

    #[test]
    fn test_changes_apply_partial() {
        let mut todo = sample();
        let changes = TodoChanges {
            status: Some(TodoStatus::Completed),
            ..Default::default()
        };
        changes.apply(&mut todo);

        assert_eq!(todo.status, TodoStatus::Completed);
        assert_eq!(todo.title, "Buy milk");
        assert_eq!(todo.description.as_deref(), Some("2 liters"));
    }

    #[test]
    fn test_changes_clear_nullable() {
        let mut todo = sample();
        todo.due_date = Some(Utc::now());

        TodoChanges {
            description: Some(None),
            due_date: Some(None),
            ..Default::default()
        }
        .apply(&mut todo);

        assert!(todo.description.is_none());
        assert!(todo.due_date.is_none());
    }

    #[test]
    fn test_changes_is_empty() {
        assert!(TodoChanges::default().is_empty());
        assert!(!TodoChanges {
            description: Some(None),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn test_filter_matches() {
        let now = Utc::now();
        let mut todo = sample();
        todo.due_date = Some(now);

        assert!(TodoFilter::default().matches(&todo));
        assert!(!TodoFilter {
            status: Some(TodoStatus::Completed),
            ..Default::default()
        }
        .matches(&todo));
        assert!(TodoFilter {
            due_before: Some(now + Duration::hours(1)),
            ..Default::default()
        }
        .matches(&todo));
        assert!(!TodoFilter {
            due_before: Some(now - Duration::hours(1)),
            ..Default::default()
        }
        .matches(&todo));

        todo.due_date = None;
        assert!(!TodoFilter {
            due_before: Some(now),
            ..Default::default()
        }
        .matches(&todo));
    }
}
