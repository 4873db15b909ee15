/// Todo endpoints
///
/// Every todo is scoped to its owner. Another user's todo answers 404
/// exactly like a missing one.
///
/// # Endpoints
///
/// - `POST /api/todos` - Create (201)
/// - `GET /api/todos` - List with `status`, `priority`, `due_before`, `skip`, `limit`
/// - `GET /api/todos/:id` - Fetch one
/// - `PUT /api/todos/:id` - Partial update
/// - `DELETE /api/todos/:id` - Delete (204)
/// - `POST /api/todos/harvest-completed` - Bank completed todos
/// - `GET /api/todos/leaderboard` - Ranking by harvested todos

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::auth::CurrentUser,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use toadoo_shared::models::harvest::{LeaderboardEntry, LeaderboardPeriod};
use toadoo_shared::models::todo::{
    NewTodo, Todo, TodoChanges, TodoFilter, TodoPriority, TodoStatus, MAX_TITLE_LENGTH,
};
use toadoo_shared::store::clamp_page;
use uuid::Uuid;
use validator::Validate;

const MAX_DESCRIPTION_LENGTH: usize = 2000;

const DEFAULT_PAGE: i64 = 100;
const MAX_PAGE: i64 = 1000;

const DEFAULT_LEADERBOARD: i64 = 10;
const MAX_LEADERBOARD: i64 = 100;

/// Create request; status and priority default to pending and medium
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTodoRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub status: TodoStatus,

    #[serde(default)]
    pub priority: TodoPriority,

    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update request
///
/// Omitted fields stay unchanged; `null` clears `description` or `due_date`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoRequest {
    pub title: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    pub status: Option<TodoStatus>,

    pub priority: Option<TodoPriority>,

    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`)
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdateTodoRequest {
    fn into_changes(self) -> ApiResult<TodoChanges> {
        if let Some(title) = &self.title {
            let length = title.chars().count();
            if length == 0 || length > MAX_TITLE_LENGTH {
                return Err(ApiError::invalid_field(
                    "title",
                    "Title must be between 1 and 200 characters",
                ));
            }
        }

        if let Some(Some(description)) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LENGTH {
                return Err(ApiError::invalid_field(
                    "description",
                    "Description must be at most 2000 characters",
                ));
            }
        }

        Ok(TodoChanges {
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            due_date: self.due_date,
        })
    }
}

/// Listing query
#[derive(Debug, Default, Deserialize)]
pub struct ListTodosQuery {
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
    pub due_before: Option<DateTime<Utc>>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Harvest response
#[derive(Debug, Serialize, Deserialize)]
pub struct HarvestResponse {
    pub harvested: i64,
    pub total_completed_count: i64,
    pub message: String,
}

/// Leaderboard query
#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub period: LeaderboardPeriod,
    pub limit: Option<i64>,
}

/// Leaderboard response
#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub period: LeaderboardPeriod,
    pub entries: Vec<LeaderboardEntry>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Todo not found".to_string())
}

/// Creates a todo owned by the caller
pub async fn create_todo(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<CreateTodoRequest>,
) -> ApiResult<(StatusCode, Json<Todo>)> {
    req.validate()?;

    let todo = state
        .store
        .create_todo(
            user.id,
            NewTodo {
                title: req.title,
                description: req.description,
                status: req.status,
                priority: req.priority,
                due_date: req.due_date,
            },
        )
        .await?;

    tracing::debug!(todo_id = %todo.id, user_id = %user.id, "Todo created");
    Ok((StatusCode::CREATED, Json(todo)))
}

/// Lists the caller's todos in creation order
pub async fn list_todos(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<ListTodosQuery>,
) -> ApiResult<Json<Vec<Todo>>> {
    let (skip, limit) = clamp_page(query.skip, query.limit, DEFAULT_PAGE, MAX_PAGE);
    let filter = TodoFilter {
        status: query.status,
        priority: query.priority,
        due_before: query.due_before,
        skip,
        limit,
    };

    Ok(Json(state.store.list_todos(user.id, &filter).await?))
}

/// Fetches one of the caller's todos
pub async fn get_todo(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Todo>> {
    let todo = state
        .store
        .todo_for_owner(id, user.id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(todo))
}

/// Applies a partial update to one of the caller's todos
pub async fn update_todo(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTodoRequest>,
) -> ApiResult<Json<Todo>> {
    let changes = req.into_changes()?;

    let todo = state
        .store
        .update_todo(id, user.id, &changes)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(todo))
}

/// Deletes one of the caller's todos
pub async fn delete_todo(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.store.delete_todo(id, user.id).await? {
        return Err(not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Deletes the caller's completed todos and credits them to the lifetime counter
///
/// # Response
///
/// ```json
/// {"harvested": 3, "total_completed_count": 42, "message": "Harvested 3 completed todos"}
/// ```
pub async fn harvest_completed(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<HarvestResponse>> {
    let outcome = state.store.harvest_completed(user.id).await?;

    let message = match outcome.harvested {
        0 => "No completed todos to harvest".to_string(),
        1 => "Harvested 1 completed todo".to_string(),
        n => format!("Harvested {} completed todos", n),
    };

    tracing::info!(
        user_id = %user.id,
        harvested = outcome.harvested,
        total = outcome.total_completed_count,
        "Completed todos harvested"
    );

    Ok(Json(HarvestResponse {
        harvested: outcome.harvested,
        total_completed_count: outcome.total_completed_count,
        message,
    }))
}

/// Ranks users by harvested todos over `period`
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<LeaderboardResponse>> {
    let (_, limit) = clamp_page(None, query.limit, DEFAULT_LEADERBOARD, MAX_LEADERBOARD);
    let entries = state
        .store
        .leaderboard(query.period, Utc::now(), limit)
        .await?;

    Ok(Json(LeaderboardResponse {
        period: query.period,
        entries,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let req: UpdateTodoRequest =
            serde_json::from_str(r#"{"description": null, "status": "completed"}"#).unwrap();
        assert_eq!(req.description, Some(None));
        assert_eq!(req.due_date, None);
        assert_eq!(req.status, Some(TodoStatus::Completed));

        let req: UpdateTodoRequest = serde_json::from_str(r#"{"description": "x"}"#).unwrap();
        assert_eq!(req.description, Some(Some("x".to_string())));
    }

    #[test]
    fn test_update_validates_lengths() {
        let empty = UpdateTodoRequest {
            title: Some(String::new()),
            ..Default::default()
        };
        assert!(empty.into_changes().is_err());

        let long = UpdateTodoRequest {
            description: Some(Some("d".repeat(MAX_DESCRIPTION_LENGTH + 1))),
            ..Default::default()
        };
        assert!(long.into_changes().is_err());

        let cleared = UpdateTodoRequest {
            description: Some(None),
            ..Default::default()
        };
        assert_eq!(cleared.into_changes().unwrap().description, Some(None));
    }

    #[test]
    fn test_create_defaults() {
        let req: CreateTodoRequest = serde_json::from_str(r#"{"title": "Buy milk"}"#).unwrap();
        assert_eq!(req.status, TodoStatus::Pending);
        assert_eq!(req.priority, TodoPriority::Medium);
        assert!(req.validate().is_ok());

        let blank: CreateTodoRequest = serde_json::from_str(r#"{"title": ""}"#).unwrap();
        assert!(blank.validate().is_err());
    }
}
