//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification of the REST API.

use crate::web::{auth, documents, tasks};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        tasks::list_tasks_handler,
        tasks::create_task_handler,
        tasks::update_task_handler,
        tasks::delete_task_handler,
        tasks::analyze_task_handler,
        tasks::analyze_text_handler,
        tasks::actions_handler,
        documents::list_documents_handler,
        documents::upload_documents_handler,
        documents::download_document_handler,
        documents::delete_document_handler,
        documents::analyze_document_handler,
        documents::list_ai_tasks_handler,
        documents::update_ai_task_handler,
        documents::get_blob_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            tasks::TaskResponse,
            tasks::CountsResponse,
            tasks::TaskListResponse,
            tasks::CreateTaskRequest,
            tasks::UpdateTaskRequest,
            tasks::AnalyzeTextRequest,
            tasks::ActionsRequest,
            tasks::AnalysisResponse,
            tasks::ActionsResponse,
            documents::DocumentResponse,
            documents::RejectedFile,
            documents::UploadResponse,
            documents::DeletionResponse,
            documents::AiTaskResponse,
            documents::AiTaskListResponse,
            documents::UpdateAiTaskRequest,
        )
    ),
    tags(
        (name = "auth", description = "Email and password accounts with cookie sessions."),
        (name = "tasks", description = "The user's own to-do list."),
        (name = "analysis", description = "AI task breakdowns and suggested actions."),
        (name = "documents", description = "Uploaded certificates, resumes, transcripts and IDs."),
        (name = "ai-tasks", description = "To-do items generated from documents.")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/signup",
            "/auth/me",
            "/tasks",
            "/tasks/{id}",
            "/tasks/{id}/analysis",
            "/analysis",
            "/actions",
            "/documents",
            "/documents/{id}/content",
            "/documents/{id}/analysis",
            "/ai-tasks",
            "/ai-tasks/{id}",
            "/blobs/{key}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
