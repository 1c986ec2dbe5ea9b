//! services/api/src/web/documents.rs
//!
//! REST handlers for uploaded documents, the AI tasks generated from them and
//! the blobs that back the larger files.

use crate::error::{port_to_http, HandlerError};
use crate::web::{
    realtime::{ChangeHub, Collection},
    state::AppState,
    tasks::{AnalysisResponse, CountsResponse},
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_planner_core::{
    documents::{self, DeletionReport, FileUpload, UploadBatch},
    domain::{AiTask, Document, DocumentCategory, Priority},
    filter::{PriorityFilter, StatusFilter, TaskCounts, TaskFilter},
};
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub name: String,
    pub content_type: String,
    /// A blob URL, or an inline `data:` URL for small files.
    pub url: String,
    pub inline: bool,
    pub size_bytes: i64,
    #[schema(value_type = String, example = "transcript")]
    pub category: DocumentCategory,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            inline: doc.is_inline(),
            name: doc.name,
            content_type: doc.content_type,
            url: doc.url,
            size_bytes: doc.size_bytes,
            category: doc.category,
            uploaded_at: doc.uploaded_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RejectedFile {
    pub name: String,
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub uploaded: Vec<DocumentResponse>,
    pub rejected: Vec<RejectedFile>,
}

#[derive(Serialize, ToSchema)]
pub struct DeletionResponse {
    pub blob_deleted: bool,
    pub ai_tasks_deleted: usize,
    pub ai_tasks_failed: usize,
}

impl From<DeletionReport> for DeletionResponse {
    fn from(r: DeletionReport) -> Self {
        Self {
            blob_deleted: r.blob_deleted,
            ai_tasks_deleted: r.ai_tasks_deleted,
            ai_tasks_failed: r.ai_tasks_failed,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AiTaskResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub text: String,
    pub completed: bool,
    #[schema(value_type = String)]
    pub priority: Priority,
    pub ai_generated: bool,
    pub created_at: DateTime<Utc>,
}

impl From<AiTask> for AiTaskResponse {
    fn from(t: AiTask) -> Self {
        Self {
            id: t.id,
            document_id: t.document_id,
            text: t.text,
            completed: t.completed,
            priority: t.priority,
            ai_generated: t.ai_generated,
            created_at: t.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AiTaskListResponse {
    pub ai_tasks: Vec<AiTaskResponse>,
    pub counts: CountsResponse,
}

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct AiTaskQuery {
    /// Only tasks generated from this document.
    pub document_id: Option<Uuid>,
    pub search: Option<String>,
    #[param(value_type = Option<String>)]
    pub priority: Option<PriorityFilter>,
    #[param(value_type = Option<String>)]
    pub status: Option<StatusFilter>,
}

impl AiTaskQuery {
    fn filter(&self) -> TaskFilter {
        TaskFilter {
            search: self.search.clone().unwrap_or_default(),
            priority: self.priority.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateAiTaskRequest {
    pub completed: bool,
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> HandlerError {
    warn!("Malformed multipart upload: {}", e);
    (StatusCode::BAD_REQUEST, "Malformed multipart body".to_string())
}

/// Header-safe version of a file name for `Content-Disposition`.
fn attachment_disposition(name: &str) -> String {
    let clean: String = name
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"' && *c != '\\')
        .collect();
    let clean = if clean.trim().is_empty() { "document" } else { clean.trim() };
    format!("attachment; filename=\"{}\"", clean)
}

/// Blob keys are namespaced per user; anything else is treated as missing.
fn owns_blob(user_id: Uuid, key: &str) -> bool {
    key.starts_with(&format!("documents/{}/", user_id))
}

//=========================================================================================
// Document Handlers
//=========================================================================================

/// GET /documents - The user's documents, newest first
#[utoipa::path(
    get,
    path = "/documents",
    tag = "documents",
    responses((status = 200, description = "Documents", body = [DocumentResponse]))
)]
pub async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let docs = state
        .db
        .list_documents(user_id)
        .await
        .map_err(|e| port_to_http("List documents", e))?;
    let docs: Vec<DocumentResponse> = docs.into_iter().map(Into::into).collect();
    Ok(Json(docs))
}

/// POST /documents - Upload one or more files
///
/// Multipart body: an optional `category` text field and one or more file parts.
/// Files are stored one after another; each stored file gets its AI tasks.
#[utoipa::path(
    post,
    path = "/documents",
    tag = "documents",
    request_body(content_type = "multipart/form-data", description = "`category` plus file parts"),
    responses(
        (status = 201, description = "At least one file stored", body = UploadResponse),
        (status = 400, description = "No file stored; see `rejected`", body = UploadResponse),
        (status = 500, description = "Storage failure; remaining files were not processed")
    )
)]
pub async fn upload_documents_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let mut category = DocumentCategory::default();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let field_name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(bad_multipart)?;
            files.push(FileUpload {
                name: file_name,
                content_type,
                data: data.to_vec(),
            });
        } else if field_name == "category" {
            let raw = field.text().await.map_err(bad_multipart)?;
            if raw.trim().is_empty() {
                continue;
            }
            category = raw
                .trim()
                .parse()
                .map_err(|e: study_planner_core::domain::UnknownVariant| {
                    (StatusCode::BAD_REQUEST, e.to_string())
                })?;
        }
    }

    if files.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No files provided".to_string()));
    }

    let batch = documents::upload_batch(
        state.db.as_ref(),
        state.blobs.as_ref(),
        &state.analyzer,
        user_id,
        files,
        category,
    )
    .await;
    let (status, report) = finish_upload(&state.changes, user_id, batch)?;
    Ok((status, Json(report)))
}

/// Publishes the stored files, then maps the batch outcome to a status.
fn finish_upload(
    changes: &ChangeHub,
    user_id: Uuid,
    batch: UploadBatch,
) -> Result<(StatusCode, UploadResponse), HandlerError> {
    if !batch.stored.is_empty() {
        changes.publish(user_id, Collection::Documents);
        changes.publish(user_id, Collection::AiTasks);
    }
    if let Some((name, _)) = batch.failed {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to upload {}", name),
        ));
    }

    let report = UploadResponse {
        uploaded: batch.stored.into_iter().map(Into::into).collect(),
        rejected: batch
            .rejected
            .into_iter()
            .map(|(name, e)| RejectedFile {
                name,
                reason: e.to_string(),
            })
            .collect(),
    };
    info!(
        %user_id,
        uploaded = report.uploaded.len(),
        rejected = report.rejected.len(),
        "Upload batch finished"
    );
    let status = if report.uploaded.is_empty() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::CREATED
    };
    Ok((status, report))
}

/// GET /documents/{id}/content - Download the file
#[utoipa::path(
    get,
    path = "/documents/{id}/content",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "Inline file as an attachment"),
        (status = 307, description = "Redirect to the blob URL"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn download_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(document_id): Path<Uuid>,
) -> Result<Response, HandlerError> {
    let document = state
        .db
        .get_document(user_id, document_id)
        .await
        .map_err(|e| port_to_http("Load document", e))?;

    if !document.is_inline() {
        return Ok(Redirect::temporary(&document.url).into_response());
    }

    let (content_type, data) = documents::decode_data_url(&document.url).ok_or_else(|| {
        error!(%document_id, "Stored data URL could not be decoded");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Download failed".to_string(),
        )
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, attachment_disposition(&document.name)),
        ],
        Bytes::from(data),
    )
        .into_response())
}

/// DELETE /documents/{id} - Delete a document, its blob and its AI tasks
#[utoipa::path(
    delete,
    path = "/documents/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "What was removed", body = DeletionResponse),
        (status = 404, description = "Document not found"),
        (status = 500, description = "The AI task lookup or the record delete failed")
    )
)]
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let document = state
        .db
        .get_document(user_id, document_id)
        .await
        .map_err(|e| port_to_http("Load document", e))?;

    let report = documents::delete_document(state.db.as_ref(), state.blobs.as_ref(), &document)
        .await
        .map_err(|e| {
            error!(%document_id, error = %e, "Document deletion failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Delete document failed".to_string(),
            )
        })?;
    state.changes.publish(user_id, Collection::Documents);
    state.changes.publish(user_id, Collection::AiTasks);

    Ok(Json(DeletionResponse::from(report)))
}

/// POST /documents/{id}/analysis - AI breakdown of a document's tasks
#[utoipa::path(
    post,
    path = "/documents/{id}/analysis",
    tag = "analysis",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "Analysis (fallback content when the model fails)", body = AnalysisResponse),
        (status = 404, description = "Document not found")
    )
)]
pub async fn analyze_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let document = state
        .db
        .get_document(user_id, document_id)
        .await
        .map_err(|e| port_to_http("Load document", e))?;

    let (text, analysis) = documents::analyze_document(state.db.as_ref(), &state.analyzer, &document)
        .await
        .map_err(|e| port_to_http("Analyze document", e))?;
    // Tasks are generated on the fly when the document had none.
    state.changes.publish(user_id, Collection::AiTasks);

    Ok(Json(AnalysisResponse::new(text, analysis)))
}

//=========================================================================================
// AI Task Handlers
//=========================================================================================

/// GET /ai-tasks - AI tasks, optionally for one document, with the view filter applied
#[utoipa::path(
    get,
    path = "/ai-tasks",
    tag = "ai-tasks",
    params(AiTaskQuery),
    responses((status = 200, description = "Filtered AI tasks and counters", body = AiTaskListResponse))
)]
pub async fn list_ai_tasks_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<AiTaskQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let all = match query.document_id {
        Some(document_id) => state.db.list_ai_tasks_for_document(user_id, document_id).await,
        None => state.db.list_ai_tasks(user_id).await,
    }
    .map_err(|e| port_to_http("List AI tasks", e))?;

    let filtered = query.filter().apply(&all);
    let counts = TaskCounts::compute(&all, &filtered);
    let ai_tasks = filtered.into_iter().cloned().map(AiTaskResponse::from).collect();

    Ok(Json(AiTaskListResponse {
        ai_tasks,
        counts: counts.into(),
    }))
}

/// PATCH /ai-tasks/{id} - Toggle an AI task's completion
#[utoipa::path(
    patch,
    path = "/ai-tasks/{id}",
    tag = "ai-tasks",
    params(("id" = Uuid, Path, description = "AI task id")),
    request_body = UpdateAiTaskRequest,
    responses(
        (status = 200, description = "Updated AI task", body = AiTaskResponse),
        (status = 404, description = "AI task not found")
    )
)]
pub async fn update_ai_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(ai_task_id): Path<Uuid>,
    Json(req): Json<UpdateAiTaskRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let task = state
        .db
        .set_ai_task_completed(user_id, ai_task_id, req.completed)
        .await
        .map_err(|e| port_to_http("Update AI task", e))?;
    state.changes.publish(user_id, Collection::AiTasks);

    Ok(Json(AiTaskResponse::from(task)))
}

//=========================================================================================
// Blob Handler
//=========================================================================================

/// GET /blobs/{key} - Raw bytes of a stored file
#[utoipa::path(
    get,
    path = "/blobs/{key}",
    tag = "documents",
    params(("key" = String, Path, description = "Storage key, `documents/<user_id>/<file>`")),
    responses(
        (status = 200, description = "File bytes"),
        (status = 404, description = "No such blob for this user")
    )
)]
pub async fn get_blob_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(key): Path<String>,
) -> Result<Response, HandlerError> {
    if !owns_blob(user_id, &key) {
        return Err((StatusCode::NOT_FOUND, "Not found".to_string()));
    }

    let blob = state
        .blobs
        .get(&key)
        .await
        .map_err(|e| port_to_http("Load blob", e))?;
    Ok(([(header::CONTENT_TYPE, blob.content_type)], Bytes::from(blob.data)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::realtime::ChangeEvent;
    use study_planner_core::{documents::UploadError, ports::PortError};
    use tokio::sync::broadcast::error::TryRecvError;

    fn stored(user_id: Uuid, name: &str) -> Document {
        Document {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            content_type: "text/plain".to_string(),
            url: "data:text/plain;base64,eA==".to_string(),
            storage_key: None,
            size_bytes: 1,
            category: DocumentCategory::Other,
            uploaded_at: Utc::now(),
        }
    }

    fn too_large(name: &str) -> (String, UploadError) {
        (
            name.to_string(),
            UploadError::TooLarge {
                name: name.to_string(),
            },
        )
    }

    fn published(rx: &mut tokio::sync::broadcast::Receiver<ChangeEvent>) -> Vec<Collection> {
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event.collection);
        }
        seen
    }

    #[test]
    fn partial_batch_is_created_and_published() {
        let hub = ChangeHub::new(8);
        let mut rx = hub.subscribe();
        let user = Uuid::new_v4();
        let batch = UploadBatch {
            stored: vec![stored(user, "notes.txt")],
            rejected: vec![too_large("huge.pdf")],
            failed: None,
        };

        let (status, report) = finish_upload(&hub, user, batch).unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(report.uploaded[0].name, "notes.txt");
        assert!(report.uploaded[0].inline);
        assert_eq!(report.rejected[0].name, "huge.pdf");
        assert_eq!(
            report.rejected[0].reason,
            "File huge.pdf is too large. Maximum size is 10MB."
        );
        assert_eq!(published(&mut rx), vec![Collection::Documents, Collection::AiTasks]);
    }

    #[test]
    fn batch_with_only_rejections_is_a_bad_request() {
        let hub = ChangeHub::new(8);
        let mut rx = hub.subscribe();
        let batch = UploadBatch {
            rejected: vec![too_large("a.pdf"), too_large("b.pdf")],
            ..Default::default()
        };

        let (status, report) = finish_upload(&hub, Uuid::new_v4(), batch).unwrap();

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(report.uploaded.is_empty());
        assert_eq!(report.rejected.len(), 2);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn storage_failure_still_publishes_files_stored_before_it() {
        let hub = ChangeHub::new(8);
        let mut rx = hub.subscribe();
        let user = Uuid::new_v4();
        let batch = UploadBatch {
            stored: vec![stored(user, "first.txt")],
            rejected: Vec::new(),
            failed: Some((
                "thesis.pdf".to_string(),
                UploadError::Storage(PortError::Unexpected("disk full".to_string())),
            )),
        };

        let Err((status, message)) = finish_upload(&hub, user, batch) else {
            panic!("a storage failure must fail the request");
        };

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Failed to upload thesis.pdf");
        let events: Vec<ChangeEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.user_id == user));
    }

    #[test]
    fn blobs_are_scoped_to_their_owner() {
        let user = Uuid::new_v4();
        assert!(owns_blob(user, &format!("documents/{}/1_cv.pdf", user)));
        assert!(!owns_blob(user, &format!("documents/{}/1_cv.pdf", Uuid::new_v4())));
        assert!(!owns_blob(user, &format!("documents/{}", user)));
    }

    #[test]
    fn disposition_strips_header_breaking_characters() {
        assert_eq!(
            attachment_disposition("my \"final\" cv.pdf"),
            "attachment; filename=\"my final cv.pdf\""
        );
        assert_eq!(attachment_disposition("résumé.pdf"), "attachment; filename=\"rsum.pdf\"");
        assert_eq!(attachment_disposition("日本"), "attachment; filename=\"document\"");
    }

    #[test]
    fn ai_task_query_builds_the_view_filter() {
        let query: AiTaskQuery = serde_json::from_value(serde_json::json!({
            "search": "essay",
            "status": "pending"
        }))
        .unwrap();
        let filter = query.filter();
        assert_eq!(filter.search, "essay");
        assert_eq!(filter.status, StatusFilter::Pending);
        assert_eq!(filter.priority, PriorityFilter::All);
    }
}
