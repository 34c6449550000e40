use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use super::dto::{CreateTask, ListTasksQuery, UpdateTask};
use super::model::{Task, TaskPriority, TaskStatus};
use super::queries;
use crate::error::{ApiError, ApiResponse, PageMetadata};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::routes::middleware_auth::AuthUser;
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<CreateTask>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()?;

    let now = Utc::now();
    let status = body.status.unwrap_or(TaskStatus::Todo);
    let task = Task {
        id: Uuid::new_v4(),
        user_id,
        title: body.title.trim().to_string(),
        description: body.description,
        status,
        priority: body.priority.unwrap_or(TaskPriority::Medium),
        due_date: body.due_date,
        tags: SqlJson(body.tags.unwrap_or_default()),
        completed_at: (status == TaskStatus::Completed).then_some(now),
        created_at: now,
        updated_at: now,
    };

    queries::insert_task(&state.db, &task).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(task))))
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(query): ApiQuery<ListTasksQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (tasks, total) = queries::list_tasks(&state.db, user_id, &query).await?;

    let limit = query.limit();
    let metadata = PageMetadata {
        page: query.page(),
        limit,
        total,
        total_pages: (total + i64::from(limit) - 1) / i64::from(limit),
    };

    Ok(Json(ApiResponse::with_metadata(tasks, metadata)))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateTask>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()?;

    let mut task = queries::find_task(&state.db, user_id, id)
        .await?
        .ok_or(ApiError::NotFound("Task not found"))?;

    if let Some(title) = body.title {
        task.title = title.trim().to_string();
    }
    if let Some(description) = body.description {
        task.description = Some(description);
    }
    if let Some(priority) = body.priority {
        task.priority = priority;
    }
    if let Some(due_date) = body.due_date {
        task.due_date = Some(due_date);
    }
    if let Some(tags) = body.tags {
        task.tags = SqlJson(tags);
    }
    if let Some(status) = body.status {
        // Completion time follows the status: stamped on the way in,
        // cleared on the way out, untouched if already completed.
        if status == TaskStatus::Completed && task.status != TaskStatus::Completed {
            task.completed_at = Some(Utc::now());
        } else if status != TaskStatus::Completed {
            task.completed_at = None;
        }
        task.status = status;
    }
    task.updated_at = Utc::now();

    queries::update_task(&state.db, &task).await?;

    Ok(Json(ApiResponse::new(task)))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = queries::find_task(&state.db, user_id, id)
        .await?
        .ok_or(ApiError::NotFound("Task not found"))?;

    queries::delete_task(&state.db, user_id, id).await?;

    Ok(Json(ApiResponse::new(serde_json::json!({
        "message": "Task deleted",
        "task": task,
    }))))
}
