use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::jwt::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

use super::dto::{CreateTaskRequest, ListTasksParams, TaskStatus, UpdateTaskRequest};
use super::repo::Task;

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks", post(create_task))
        .route("/tasks/:id", get(get_task))
        .route("/tasks/:id", put(update_task))
        .route("/tasks/:id", delete(delete_task))
}

#[instrument(skip(state))]
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<ListTasksParams>,
) -> ApiResult<Json<Vec<Task>>> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()?;
    let tasks = Task::list_by_owner(&state.db, user_id, status).await?;
    Ok(Json(tasks))
}

#[instrument(skip(state))]
pub async fn get_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Task>> {
    let task = Task::find_owned(&state.db, user_id, id)
        .await?
        .ok_or(ApiError::NotFound("task"))?;
    Ok(Json(task))
}

#[instrument(skip(state, payload))]
pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let (title, status) = payload.validated()?;
    let task = Task::create(&state.db, user_id, &title, status).await?;
    info!(task_id = task.id, user_id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

#[instrument(skip(state, payload))]
pub async fn update_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    let patch = payload.into_patch()?;
    let task = Task::update_owned(&state.db, user_id, id, &patch)
        .await?
        .ok_or(ApiError::NotFound("task"))?;
    Ok(Json(task))
}

#[instrument(skip(state))]
pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !Task::delete_owned(&state.db, user_id, id).await? {
        return Err(ApiError::NotFound("task"));
    }
    info!(task_id = id, user_id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}
