//! crates/study_planner_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete database, blob store and language model.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{
    AiTask, Document, NewDocument, Priority, Task, TaskUpdate, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(&self, email: &str, hashed_password: &str)
        -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Tasks ---
    /// Newest first.
    async fn list_tasks(&self, user_id: Uuid) -> PortResult<Vec<Task>>;

    async fn get_task(&self, user_id: Uuid, task_id: Uuid) -> PortResult<Task>;

    async fn create_task(&self, user_id: Uuid, text: &str, priority: Priority)
        -> PortResult<Task>;

    async fn update_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        update: &TaskUpdate,
    ) -> PortResult<Task>;

    async fn delete_task(&self, user_id: Uuid, task_id: Uuid) -> PortResult<()>;

    // --- Documents ---
    /// Newest upload first.
    async fn list_documents(&self, user_id: Uuid) -> PortResult<Vec<Document>>;

    async fn get_document(&self, user_id: Uuid, document_id: Uuid) -> PortResult<Document>;

    async fn create_document(&self, document: NewDocument) -> PortResult<Document>;

    async fn delete_document(&self, user_id: Uuid, document_id: Uuid) -> PortResult<()>;

    // --- AI-generated tasks ---
    /// Newest first.
    async fn list_ai_tasks(&self, user_id: Uuid) -> PortResult<Vec<AiTask>>;

    async fn list_ai_tasks_for_document(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> PortResult<Vec<AiTask>>;

    async fn create_ai_task(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        text: &str,
        priority: Priority,
    ) -> PortResult<AiTask>;

    async fn set_ai_task_completed(
        &self,
        user_id: Uuid,
        ai_task_id: Uuid,
        completed: bool,
    ) -> PortResult<AiTask>;

    async fn delete_ai_task(&self, user_id: Uuid, ai_task_id: Uuid) -> PortResult<()>;
}

/// A stored object as returned by the blob store.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait BlobStorageService: Send + Sync {
    /// Stores `data` under `key` and returns a URL the blob can be retrieved from.
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> PortResult<String>;

    async fn get(&self, key: &str) -> PortResult<StoredBlob>;

    async fn delete(&self, key: &str) -> PortResult<()>;
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Sends a single prompt to the language model and returns its raw text reply.
    async fn complete(&self, prompt: &str) -> PortResult<String>;
}
