use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{CompleteRequest, NotificationRequest, TodoRequest};
use crate::{
    auth::extractors::CurrentUser,
    error::{ensure_positive_id, ApiError},
    extract::JsonBody,
    state::AppState,
    store::{StoreError, Todo, TodoFields},
};

// Every route below takes `CurrentUser` first and passes `identity.id` as the
// owner to the store, which filters on it.
pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/todo/", get(read_all).post(create_todo))
        .route(
            "/todo/:todo_id",
            get(read_todo).put(update_todo).delete(delete_todo),
        )
        .route("/todo/complete/:todo_id", put(change_complete_status))
        .route("/todo/notification_time/:todo_id", put(change_notification_time))
}

const NOT_FOUND: ApiError = ApiError::NotFound("Todo");

#[instrument(skip(state, identity), fields(user_id = identity.id))]
pub async fn read_all(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Todo>>, ApiError> {
    Ok(Json(state.todos.list_for_owner(identity.id).await?))
}

#[instrument(skip(state, identity), fields(user_id = identity.id))]
pub async fn read_todo(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(todo_id): Path<i64>,
) -> Result<Json<Todo>, ApiError> {
    let todo_id = ensure_positive_id("todo_id", todo_id)?;
    state
        .todos
        .find(todo_id, identity.id)
        .await?
        .map(Json)
        .ok_or(NOT_FOUND)
}

#[instrument(skip(state, identity, payload), fields(user_id = identity.id))]
pub async fn create_todo(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<TodoRequest>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let fields = TodoFields::try_from(payload)?;
    // A token can outlive its account; the owner row is then gone.
    let todo = state
        .todos
        .create(identity.id, fields)
        .await
        .map_err(|e| match e {
            StoreError::UnknownOwner => ApiError::NotFound("User"),
            other => other.into(),
        })?;
    info!(todo_id = todo.id, "todo created");
    Ok((StatusCode::CREATED, Json(todo)))
}

#[instrument(skip(state, identity, payload), fields(user_id = identity.id))]
pub async fn update_todo(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(todo_id): Path<i64>,
    JsonBody(payload): JsonBody<TodoRequest>,
) -> Result<Json<Todo>, ApiError> {
    let todo_id = ensure_positive_id("todo_id", todo_id)?;
    let fields = TodoFields::try_from(payload)?;
    state
        .todos
        .update(todo_id, identity.id, fields)
        .await?
        .map(Json)
        .ok_or(NOT_FOUND)
}

#[instrument(skip(state, identity, payload), fields(user_id = identity.id))]
pub async fn change_complete_status(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(todo_id): Path<i64>,
    JsonBody(payload): JsonBody<CompleteRequest>,
) -> Result<Json<Todo>, ApiError> {
    let todo_id = ensure_positive_id("todo_id", todo_id)?;
    state
        .todos
        .set_complete(todo_id, identity.id, payload.complete)
        .await?
        .map(Json)
        .ok_or(NOT_FOUND)
}

#[instrument(skip(state, identity, payload), fields(user_id = identity.id))]
pub async fn change_notification_time(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(todo_id): Path<i64>,
    JsonBody(payload): JsonBody<NotificationRequest>,
) -> Result<Json<Todo>, ApiError> {
    let todo_id = ensure_positive_id("todo_id", todo_id)?;
    state
        .todos
        .set_notification_time(todo_id, identity.id, payload.notification_time)
        .await?
        .map(Json)
        .ok_or(NOT_FOUND)
}

#[instrument(skip(state, identity), fields(user_id = identity.id))]
pub async fn delete_todo(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(todo_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let todo_id = ensure_positive_id("todo_id", todo_id)?;
    if !state.todos.delete(todo_id, identity.id).await? {
        return Err(NOT_FOUND);
    }
    info!(todo_id, "todo deleted");
    Ok(StatusCode::NO_CONTENT)
}
