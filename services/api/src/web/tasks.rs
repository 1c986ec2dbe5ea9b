//! services/api/src/web/tasks.rs
//!
//! REST handlers for the user's own to-do list, the task analysis and the
//! heuristic action extraction.

use crate::error::{port_to_http, HandlerError};
use crate::web::{realtime::Collection, state::AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_planner_core::{
    domain::{AiAnalysis, Priority, Task, TaskUpdate},
    filter::{PriorityFilter, StatusFilter, TaskCounts, TaskFilter},
    text_actions::{extract_actions, SuggestedAction},
};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct TaskResponse {
    pub id: Uuid,
    pub text: String,
    pub completed: bool,
    #[schema(value_type = String, example = "medium")]
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            text: task.text,
            completed: task.completed,
            priority: task.priority,
            created_at: task.created_at,
        }
    }
}

/// Completion counters for the whole list and for the filtered view.
#[derive(Serialize, ToSchema)]
pub struct CountsResponse {
    pub completed: usize,
    pub total: usize,
    pub filtered_completed: usize,
    pub filtered_total: usize,
}

impl From<TaskCounts> for CountsResponse {
    fn from(c: TaskCounts) -> Self {
        Self {
            completed: c.completed,
            total: c.total,
            filtered_completed: c.filtered_completed,
            filtered_total: c.filtered_total,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskResponse>,
    pub counts: CountsResponse,
}

/// The search/priority/status view filter shared by task and AI task lists.
#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct FilterQuery {
    /// Case-insensitive substring of the task text.
    pub search: Option<String>,
    /// `all`, `low`, `medium` or `high`.
    #[param(value_type = Option<String>)]
    pub priority: Option<PriorityFilter>,
    /// `all`, `completed` or `pending`.
    #[param(value_type = Option<String>)]
    pub status: Option<StatusFilter>,
}

impl From<FilterQuery> for TaskFilter {
    fn from(q: FilterQuery) -> Self {
        TaskFilter {
            search: q.search.unwrap_or_default(),
            priority: q.priority.unwrap_or_default(),
            status: q.status.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    pub text: String,
    #[schema(value_type = Option<String>, example = "high")]
    pub priority: Option<Priority>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    pub text: Option<String>,
    pub completed: Option<bool>,
    #[schema(value_type = Option<String>)]
    pub priority: Option<Priority>,
}

impl UpdateTaskRequest {
    /// Trims the new text; a blank replacement text is rejected.
    fn into_update(self) -> Result<TaskUpdate, HandlerError> {
        let text = match self.text {
            Some(text) if text.trim().is_empty() => {
                return Err((StatusCode::BAD_REQUEST, "Task text cannot be empty".to_string()))
            }
            Some(text) => Some(text.trim().to_string()),
            None => None,
        };
        let update = TaskUpdate {
            text,
            completed: self.completed,
            priority: self.priority,
        };
        if update.is_empty() {
            return Err((StatusCode::BAD_REQUEST, "Nothing to update".to_string()));
        }
        Ok(update)
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AnalyzeTextRequest {
    pub text: String,
    #[schema(value_type = Option<String>)]
    pub priority: Option<Priority>,
}

#[derive(Deserialize, ToSchema)]
pub struct ActionsRequest {
    pub text: String,
}

/// An analysis plus the deep links found in the analyzed text.
#[derive(Serialize, ToSchema)]
pub struct AnalysisResponse {
    /// The text that was sent for analysis.
    pub text: String,
    #[schema(value_type = Object)]
    pub analysis: AiAnalysis,
    #[schema(value_type = Vec<Object>)]
    pub actions: Vec<SuggestedAction>,
}

impl AnalysisResponse {
    pub fn new(text: String, analysis: AiAnalysis) -> Self {
        let actions = extract_actions(&text);
        Self {
            text,
            analysis,
            actions,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ActionsResponse {
    #[schema(value_type = Vec<Object>)]
    pub actions: Vec<SuggestedAction>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /tasks - The user's tasks, newest first, with the view filter applied
#[utoipa::path(
    get,
    path = "/tasks",
    tag = "tasks",
    params(FilterQuery),
    responses(
        (status = 200, description = "Filtered tasks and counters", body = TaskListResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_tasks_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<FilterQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let all = state
        .db
        .list_tasks(user_id)
        .await
        .map_err(|e| port_to_http("List tasks", e))?;

    let filter = TaskFilter::from(query);
    let filtered = filter.apply(&all);
    let counts = TaskCounts::compute(&all, &filtered);
    let tasks = filtered.into_iter().cloned().map(TaskResponse::from).collect();

    Ok(Json(TaskListResponse {
        tasks,
        counts: counts.into(),
    }))
}

/// POST /tasks - Create a task
#[utoipa::path(
    post,
    path = "/tasks",
    tag = "tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 400, description = "Blank task text")
    )
)]
pub async fn create_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Task text cannot be empty".to_string()));
    }

    let task = state
        .db
        .create_task(user_id, text, req.priority.unwrap_or_default())
        .await
        .map_err(|e| port_to_http("Create task", e))?;
    info!(task_id = %task.id, %user_id, "Task created");
    state.changes.publish(user_id, Collection::Tasks);

    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

/// PATCH /tasks/{id} - Toggle completion, rename or re-prioritize a task
#[utoipa::path(
    patch,
    path = "/tasks/{id}",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Updated task", body = TaskResponse),
        (status = 400, description = "Empty or invalid update"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn update_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let update = req.into_update()?;
    let task = state
        .db
        .update_task(user_id, task_id, &update)
        .await
        .map_err(|e| port_to_http("Update task", e))?;
    state.changes.publish(user_id, Collection::Tasks);

    Ok(Json(TaskResponse::from(task)))
}

/// DELETE /tasks/{id} - Delete a task
#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn delete_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    state
        .db
        .delete_task(user_id, task_id)
        .await
        .map_err(|e| port_to_http("Delete task", e))?;
    state.changes.publish(user_id, Collection::Tasks);

    Ok(StatusCode::NO_CONTENT)
}

/// POST /tasks/{id}/analysis - AI breakdown of one task
#[utoipa::path(
    post,
    path = "/tasks/{id}/analysis",
    tag = "analysis",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Analysis (fallback content when the model fails)", body = AnalysisResponse),
        (status = 404, description = "Task not found")
    )
)]
pub async fn analyze_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let task = state
        .db
        .get_task(user_id, task_id)
        .await
        .map_err(|e| port_to_http("Load task", e))?;

    let analysis = state.analyzer.analyze(&task.text, task.priority).await;
    Ok(Json(AnalysisResponse::new(task.text, analysis)))
}

/// POST /analysis - AI breakdown of arbitrary text
#[utoipa::path(
    post,
    path = "/analysis",
    tag = "analysis",
    request_body = AnalyzeTextRequest,
    responses(
        (status = 200, description = "Analysis (fallback content when the model fails)", body = AnalysisResponse),
        (status = 400, description = "Blank text")
    )
)]
pub async fn analyze_text_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeTextRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Text cannot be empty".to_string()));
    }

    let analysis = state
        .analyzer
        .analyze(&text, req.priority.unwrap_or_default())
        .await;
    Ok(Json(AnalysisResponse::new(text, analysis)))
}

/// POST /actions - Deep links found in the text
#[utoipa::path(
    post,
    path = "/actions",
    tag = "analysis",
    request_body = ActionsRequest,
    responses((status = 200, description = "Suggested actions in detection order", body = ActionsResponse))
)]
pub async fn actions_handler(Json(req): Json<ActionsRequest>) -> impl IntoResponse {
    Json(ActionsResponse {
        actions: extract_actions(&req.text),
    })
}
