use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{NewTodo, Todo};
use crate::routes::{to_iso, Page, PageQuery};
use crate::state::AppState;
use crate::store::TodoChanges;
use crate::utils::json::{classify_nullable, required_bool, required_string, NullableValue};

const TODO_NOT_FOUND: &str = "Todo not found";

#[derive(Serialize)]
pub struct TodoResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Todo> for TodoResponse {
    fn from(todo: Todo) -> Self {
        Self {
            id: todo.id,
            title: todo.title,
            description: todo.description,
            completed: todo.completed,
            created_at: to_iso(todo.created_at),
            updated_at: to_iso(todo.updated_at),
        }
    }
}

#[derive(Deserialize)]
pub struct CreateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateTodoRequest>,
) -> AppResult<(StatusCode, Json<TodoResponse>)> {
    let title = payload
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Title is required"))?;

    let todo = state
        .store
        .insert_todo(NewTodo {
            id: Uuid::new_v4(),
            title,
            description: payload.description,
            completed: false,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(todo.into())))
}

pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<PageQuery>,
) -> AppResult<Json<Page<TodoResponse>>> {
    let (page, page_size, offset) = params.normalized();

    let (items, total) = tokio::join!(
        state.store.list_todos(offset, page_size),
        state.store.count_todos(),
    );

    Ok(Json(Page {
        page,
        page_size,
        total: total?,
        items: items?.into_iter().map(TodoResponse::from).collect(),
    }))
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TodoResponse>> {
    let todo = state
        .store
        .todo_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(TODO_NOT_FOUND))?;
    Ok(Json(todo.into()))
}

#[derive(Deserialize)]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

/// PUT: partial merge, omitted fields keep their stored value.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTodoRequest>,
) -> AppResult<Json<TodoResponse>> {
    let changes = TodoChanges {
        title: payload.title,
        description: payload.description.map(Some),
        completed: payload.completed,
    };
    apply_changes(&state, id, changes).await
}

/// PATCH: only the allow-listed fields are read, and an empty update set is
/// rejected. `description` may be set to JSON null to clear it.
pub async fn patch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<TodoResponse>> {
    let description = match classify_nullable(body.get("description")) {
        Ok(NullableValue::Omitted) => None,
        Ok(NullableValue::Null) => Some(None),
        Ok(NullableValue::String(value)) => Some(Some(value)),
        Err(message) => return Err(AppError::bad_request(message)),
    };

    let changes = TodoChanges {
        title: required_string(body.get("title")).map_err(AppError::bad_request)?,
        description,
        completed: required_bool(body.get("completed")).map_err(AppError::bad_request)?,
    };

    if changes.is_empty() {
        return Err(AppError::bad_request("No valid fields to update"));
    }

    apply_changes(&state, id, changes).await
}

async fn apply_changes(
    state: &AppState,
    id: Uuid,
    changes: TodoChanges,
) -> AppResult<Json<TodoResponse>> {
    let todo = state
        .store
        .update_todo(id, changes)
        .await?
        .ok_or_else(|| AppError::not_found(TODO_NOT_FOUND))?;
    Ok(Json(todo.into()))
}

pub async fn destroy(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    if !state.store.delete_todo(id).await? {
        return Err(AppError::not_found(TODO_NOT_FOUND));
    }
    Ok(StatusCode::NO_CONTENT)
}
