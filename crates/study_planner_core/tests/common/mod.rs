//! In-memory port doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use study_planner_core::analysis::TaskAnalyzer;
use study_planner_core::domain::{
    AiTask, Document, NewDocument, Priority, Task, TaskUpdate, User, UserCredentials,
};
use study_planner_core::ports::{
    BlobStorageService, CompletionService, DatabaseService, PortError, PortResult, StoredBlob,
};
use uuid::Uuid;

pub const STEPS_REPLY: &str = r#"```json
{
  "summary": "Polish the resume",
  "suggestedSteps": ["Update work history", "Add new skills", "Proofread"],
  "estimatedTime": "2 hours",
  "difficulty": "Easy",
  "resources": [],
  "tips": ["Keep it to one page"]
}
```"#;

//=========================================================================================
// Database
//=========================================================================================

#[derive(Default)]
struct Tables {
    tasks: Vec<Task>,
    documents: Vec<Document>,
    ai_tasks: Vec<AiTask>,
}

#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
    failing_ai_task_deletes: Mutex<HashSet<Uuid>>,
    fail_ai_task_creates: Mutex<bool>,
    failing_ai_task_create: Mutex<Option<usize>>,
    ai_task_create_calls: Mutex<usize>,
    fail_ai_task_lookups: Mutex<bool>,
    pub delete_ai_task_calls: Mutex<Vec<Uuid>>,
}

impl InMemoryDb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_delete_of(&self, ai_task_id: Uuid) {
        self.failing_ai_task_deletes.lock().unwrap().insert(ai_task_id);
    }

    pub fn fail_ai_task_creates(&self) {
        *self.fail_ai_task_creates.lock().unwrap() = true;
    }

    /// Fails only the `n`th `create_ai_task` call, counting from zero.
    pub fn fail_ai_task_create_number(&self, n: usize) {
        *self.failing_ai_task_create.lock().unwrap() = Some(n);
    }

    pub fn fail_ai_task_lookups(&self) {
        *self.fail_ai_task_lookups.lock().unwrap() = true;
    }

    pub fn ai_tasks(&self) -> Vec<AiTask> {
        self.tables.lock().unwrap().ai_tasks.clone()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.tables.lock().unwrap().documents.clone()
    }

    pub fn insert_ai_task(&self, user_id: Uuid, document_id: Uuid, text: &str) -> AiTask {
        let task = AiTask {
            id: Uuid::new_v4(),
            user_id,
            document_id,
            text: text.to_string(),
            completed: false,
            priority: Priority::Medium,
            created_at: Utc::now(),
            ai_generated: true,
        };
        self.tables.lock().unwrap().ai_tasks.push(task.clone());
        task
    }
}

fn not_found(what: &str, id: Uuid) -> PortError {
    PortError::NotFound(format!("{what} {id} not found"))
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user_with_email(&self, email: &str, _hashed: &str) -> PortResult<User> {
        Ok(User {
            user_id: Uuid::new_v4(),
            email: Some(email.to_string()),
        })
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        Ok(User {
            user_id,
            email: None,
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        Err(PortError::NotFound(email.to_string()))
    }

    async fn create_auth_session(&self, _: &str, _: Uuid, _: DateTime<Utc>) -> PortResult<()> {
        Ok(())
    }

    async fn validate_auth_session(&self, _: &str) -> PortResult<Uuid> {
        Err(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, _: &str) -> PortResult<()> {
        Ok(())
    }

    async fn list_tasks(&self, user_id: Uuid) -> PortResult<Vec<Task>> {
        let tables = self.tables.lock().unwrap();
        let mut tasks: Vec<Task> = tables
            .tasks
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn get_task(&self, user_id: Uuid, task_id: Uuid) -> PortResult<Task> {
        let tables = self.tables.lock().unwrap();
        tables
            .tasks
            .iter()
            .find(|t| t.id == task_id && t.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found("Task", task_id))
    }

    async fn create_task(&self, user_id: Uuid, text: &str, priority: Priority) -> PortResult<Task> {
        let task = Task {
            id: Uuid::new_v4(),
            user_id,
            text: text.to_string(),
            completed: false,
            priority,
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        update: &TaskUpdate,
    ) -> PortResult<Task> {
        let mut tables = self.tables.lock().unwrap();
        let task = tables
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id && t.user_id == user_id)
            .ok_or_else(|| not_found("Task", task_id))?;
        if let Some(text) = &update.text {
            task.text = text.clone();
        }
        if let Some(completed) = update.completed {
            task.completed = completed;
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        Ok(task.clone())
    }

    async fn delete_task(&self, user_id: Uuid, task_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.tasks.len();
        tables
            .tasks
            .retain(|t| !(t.id == task_id && t.user_id == user_id));
        if tables.tasks.len() == before {
            return Err(not_found("Task", task_id));
        }
        Ok(())
    }

    async fn list_documents(&self, user_id: Uuid) -> PortResult<Vec<Document>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .documents
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_document(&self, user_id: Uuid, document_id: Uuid) -> PortResult<Document> {
        let tables = self.tables.lock().unwrap();
        tables
            .documents
            .iter()
            .find(|d| d.id == document_id && d.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found("Document", document_id))
    }

    async fn create_document(&self, document: NewDocument) -> PortResult<Document> {
        let document = Document {
            id: Uuid::new_v4(),
            user_id: document.user_id,
            name: document.name,
            content_type: document.content_type,
            url: document.url,
            storage_key: document.storage_key,
            size_bytes: document.size_bytes,
            category: document.category,
            uploaded_at: Utc::now(),
        };
        self.tables.lock().unwrap().documents.push(document.clone());
        Ok(document)
    }

    async fn delete_document(&self, user_id: Uuid, document_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.documents.len();
        tables
            .documents
            .retain(|d| !(d.id == document_id && d.user_id == user_id));
        if tables.documents.len() == before {
            return Err(not_found("Document", document_id));
        }
        Ok(())
    }

    async fn list_ai_tasks(&self, user_id: Uuid) -> PortResult<Vec<AiTask>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .ai_tasks
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_ai_tasks_for_document(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> PortResult<Vec<AiTask>> {
        if *self.fail_ai_task_lookups.lock().unwrap() {
            return Err(PortError::Unexpected("query timed out".to_string()));
        }
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .ai_tasks
            .iter()
            .filter(|t| t.user_id == user_id && t.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn create_ai_task(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        text: &str,
        priority: Priority,
    ) -> PortResult<AiTask> {
        let call = {
            let mut calls = self.ai_task_create_calls.lock().unwrap();
            *calls += 1;
            *calls - 1
        };
        if *self.fail_ai_task_creates.lock().unwrap()
            || *self.failing_ai_task_create.lock().unwrap() == Some(call)
        {
            return Err(PortError::Unexpected("write rejected".to_string()));
        }
        let task = AiTask {
            id: Uuid::new_v4(),
            user_id,
            document_id,
            text: text.to_string(),
            completed: false,
            priority,
            created_at: Utc::now(),
            ai_generated: true,
        };
        self.tables.lock().unwrap().ai_tasks.push(task.clone());
        Ok(task)
    }

    async fn set_ai_task_completed(
        &self,
        user_id: Uuid,
        ai_task_id: Uuid,
        completed: bool,
    ) -> PortResult<AiTask> {
        let mut tables = self.tables.lock().unwrap();
        let task = tables
            .ai_tasks
            .iter_mut()
            .find(|t| t.id == ai_task_id && t.user_id == user_id)
            .ok_or_else(|| not_found("AI task", ai_task_id))?;
        task.completed = completed;
        Ok(task.clone())
    }

    async fn delete_ai_task(&self, user_id: Uuid, ai_task_id: Uuid) -> PortResult<()> {
        self.delete_ai_task_calls.lock().unwrap().push(ai_task_id);
        if self.failing_ai_task_deletes.lock().unwrap().contains(&ai_task_id) {
            return Err(PortError::Unexpected("delete rejected".to_string()));
        }
        let mut tables = self.tables.lock().unwrap();
        tables
            .ai_tasks
            .retain(|t| !(t.id == ai_task_id && t.user_id == user_id));
        Ok(())
    }
}

//=========================================================================================
// Blob store
//=========================================================================================

#[derive(Default)]
pub struct MemoryBlobs {
    objects: Mutex<HashMap<String, (StoredBlob, HashMap<String, String>)>>,
    fail_puts: Mutex<bool>,
    fail_deletes: Mutex<bool>,
    pub delete_calls: Mutex<Vec<String>>,
}

impl MemoryBlobs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_puts(&self) {
        *self.fail_puts.lock().unwrap() = true;
    }

    pub fn fail_deletes(&self) {
        *self.fail_deletes.lock().unwrap() = true;
    }

    pub fn metadata(&self, key: &str) -> Option<HashMap<String, String>> {
        self.objects.lock().unwrap().get(key).map(|(_, m)| m.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStorageService for MemoryBlobs {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> PortResult<String> {
        if *self.fail_puts.lock().unwrap() {
            return Err(PortError::Unexpected("bucket unavailable".to_string()));
        }
        let blob = StoredBlob {
            data: data.to_vec(),
            content_type: content_type.to_string(),
        };
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (blob, metadata.clone()));
        Ok(format!("memory://{key}"))
    }

    async fn get(&self, key: &str) -> PortResult<StoredBlob> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(blob, _)| blob.clone())
            .ok_or_else(|| PortError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        self.delete_calls.lock().unwrap().push(key.to_string());
        if *self.fail_deletes.lock().unwrap() {
            return Err(PortError::Unexpected("object not found".to_string()));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

//=========================================================================================
// Language model
//=========================================================================================

/// Replies with a fixed text, or fails every call when built with `failing()`.
pub struct CannedCompletion {
    reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl CannedCompletion {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CompletionService for CannedCompletion {
    async fn complete(&self, prompt: &str) -> PortResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| PortError::Unexpected("network unreachable".to_string()))
    }
}

pub fn analyzer(completion: Arc<CannedCompletion>) -> TaskAnalyzer {
    TaskAnalyzer::new(completion)
}
