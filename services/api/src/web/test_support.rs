//! In-memory ports for handler and live-query tests.

use crate::config::Config;
use crate::web::{realtime::ChangeHub, state::AppState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use study_planner_core::analysis::TaskAnalyzer;
use study_planner_core::domain::{
    AiTask, Document, NewDocument, Priority, Task, TaskUpdate, User, UserCredentials,
};
use study_planner_core::ports::{
    BlobStorageService, CompletionService, DatabaseService, PortError, PortResult, StoredBlob,
};
use uuid::Uuid;

/// Serves seeded tasks; every other collection is empty.
#[derive(Default)]
pub struct MemoryDb {
    tasks: Mutex<Vec<Task>>,
}

impl MemoryDb {
    pub fn seed_task(&self, user_id: Uuid, text: &str) -> Task {
        let task = Task {
            id: Uuid::new_v4(),
            user_id,
            text: text.to_string(),
            completed: false,
            priority: Priority::Medium,
            created_at: Utc::now(),
        };
        self.tasks.lock().unwrap().push(task.clone());
        task
    }
}

fn missing(what: &str) -> PortError {
    PortError::NotFound(format!("{what} not found"))
}

#[async_trait]
impl DatabaseService for MemoryDb {
    async fn create_user_with_email(&self, _email: &str, _hashed: &str) -> PortResult<User> {
        Err(PortError::Unexpected("read-only test store".to_string()))
    }

    async fn get_user_by_id(&self, _user_id: Uuid) -> PortResult<User> {
        Err(missing("user"))
    }

    async fn get_user_by_email(&self, _email: &str) -> PortResult<UserCredentials> {
        Err(missing("user"))
    }

    async fn create_auth_session(
        &self,
        _session_id: &str,
        _user_id: Uuid,
        _expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        Ok(())
    }

    async fn validate_auth_session(&self, _session_id: &str) -> PortResult<Uuid> {
        Err(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, _session_id: &str) -> PortResult<()> {
        Ok(())
    }

    async fn list_tasks(&self, user_id: Uuid) -> PortResult<Vec<Task>> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks.iter().filter(|t| t.user_id == user_id).cloned().collect())
    }

    async fn get_task(&self, _user_id: Uuid, _task_id: Uuid) -> PortResult<Task> {
        Err(missing("task"))
    }

    async fn create_task(&self, user_id: Uuid, text: &str, _priority: Priority) -> PortResult<Task> {
        Ok(self.seed_task(user_id, text))
    }

    async fn update_task(
        &self,
        _user_id: Uuid,
        _task_id: Uuid,
        _update: &TaskUpdate,
    ) -> PortResult<Task> {
        Err(missing("task"))
    }

    async fn delete_task(&self, _user_id: Uuid, _task_id: Uuid) -> PortResult<()> {
        Err(missing("task"))
    }

    async fn list_documents(&self, _user_id: Uuid) -> PortResult<Vec<Document>> {
        Ok(Vec::new())
    }

    async fn get_document(&self, _user_id: Uuid, _document_id: Uuid) -> PortResult<Document> {
        Err(missing("document"))
    }

    async fn create_document(&self, _document: NewDocument) -> PortResult<Document> {
        Err(PortError::Unexpected("read-only test store".to_string()))
    }

    async fn delete_document(&self, _user_id: Uuid, _document_id: Uuid) -> PortResult<()> {
        Err(missing("document"))
    }

    async fn list_ai_tasks(&self, _user_id: Uuid) -> PortResult<Vec<AiTask>> {
        Ok(Vec::new())
    }

    async fn list_ai_tasks_for_document(
        &self,
        _user_id: Uuid,
        _document_id: Uuid,
    ) -> PortResult<Vec<AiTask>> {
        Ok(Vec::new())
    }

    async fn create_ai_task(
        &self,
        _user_id: Uuid,
        _document_id: Uuid,
        _text: &str,
        _priority: Priority,
    ) -> PortResult<AiTask> {
        Err(PortError::Unexpected("read-only test store".to_string()))
    }

    async fn set_ai_task_completed(
        &self,
        _user_id: Uuid,
        _ai_task_id: Uuid,
        _completed: bool,
    ) -> PortResult<AiTask> {
        Err(missing("ai task"))
    }

    async fn delete_ai_task(&self, _user_id: Uuid, _ai_task_id: Uuid) -> PortResult<()> {
        Err(missing("ai task"))
    }
}

pub struct NoBlobs;

#[async_trait]
impl BlobStorageService for NoBlobs {
    async fn put(
        &self,
        _key: &str,
        _data: &[u8],
        _content_type: &str,
        _metadata: &HashMap<String, String>,
    ) -> PortResult<String> {
        Err(PortError::Unexpected("no blob store".to_string()))
    }

    async fn get(&self, key: &str) -> PortResult<StoredBlob> {
        Err(missing(key))
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        Err(missing(key))
    }
}

pub struct OfflineModel;

#[async_trait]
impl CompletionService for OfflineModel {
    async fn complete(&self, _prompt: &str) -> PortResult<String> {
        Err(PortError::Unexpected("model offline".to_string()))
    }
}

/// App state over `db` with a change hub of the given capacity.
pub fn test_state(db: Arc<MemoryDb>, hub_capacity: usize) -> Arc<AppState> {
    let config = Config::from_lookup(|name| {
        (name == "DATABASE_URL").then(|| "postgres://localhost/test".to_string())
    })
    .unwrap();
    Arc::new(AppState {
        db,
        blobs: Arc::new(NoBlobs),
        analyzer: TaskAnalyzer::new(Arc::new(OfflineModel)),
        config: Arc::new(config),
        changes: ChangeHub::new(hub_capacity),
    })
}
