//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use study_planner_core::domain::{
    AiTask, Document, DocumentCategory, NewDocument, Priority, Task, TaskUpdate, User,
    UserCredentials,
};
use study_planner_core::ports::{DatabaseService, PortError, PortResult};
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, user_id, text, completed, priority, created_at";
const DOCUMENT_COLUMNS: &str =
    "id, user_id, name, content_type, url, storage_key, size_bytes, category, uploaded_at";
const AI_TASK_COLUMNS: &str =
    "id, user_id, document_id, text, completed, priority, ai_generated, created_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: &str, id: Uuid) -> impl FnOnce(sqlx::Error) -> PortError + '_ {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} {} not found", what, id)),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn parse_priority(raw: &str) -> PortResult<Priority> {
    raw.parse()
        .map_err(|e: study_planner_core::domain::UnknownVariant| PortError::Unexpected(e.to_string()))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct TaskRecord {
    id: Uuid,
    user_id: Uuid,
    text: String,
    completed: bool,
    priority: String,
    created_at: DateTime<Utc>,
}
impl TaskRecord {
    fn to_domain(self) -> PortResult<Task> {
        Ok(Task {
            id: self.id,
            user_id: self.user_id,
            text: self.text,
            completed: self.completed,
            priority: parse_priority(&self.priority)?,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct DocumentRecord {
    id: Uuid,
    user_id: Uuid,
    name: String,
    content_type: String,
    url: String,
    storage_key: Option<String>,
    size_bytes: i64,
    category: String,
    uploaded_at: DateTime<Utc>,
}
impl DocumentRecord {
    fn to_domain(self) -> PortResult<Document> {
        let category: DocumentCategory = self
            .category
            .parse()
            .map_err(|e: study_planner_core::domain::UnknownVariant| PortError::Unexpected(e.to_string()))?;
        Ok(Document {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            content_type: self.content_type,
            url: self.url,
            storage_key: self.storage_key,
            size_bytes: self.size_bytes,
            category,
            uploaded_at: self.uploaded_at,
        })
    }
}

#[derive(FromRow)]
struct AiTaskRecord {
    id: Uuid,
    user_id: Uuid,
    document_id: Uuid,
    text: String,
    completed: bool,
    priority: String,
    ai_generated: bool,
    created_at: DateTime<Utc>,
}
impl AiTaskRecord {
    fn to_domain(self) -> PortResult<AiTask> {
        Ok(AiTask {
            id: self.id,
            user_id: self.user_id,
            document_id: self.document_id,
            text: self.text,
            completed: self.completed,
            priority: parse_priority(&self.priority)?,
            created_at: self.created_at,
            ai_generated: self.ai_generated,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Auth ---

    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("User", user_id))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User with email {} not found", email)))?;
        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Tasks ---

    async fn list_tasks(&self, user_id: Uuid) -> PortResult<Vec<Task>> {
        let records = sqlx::query_as::<_, TaskRecord>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(TaskRecord::to_domain).collect()
    }

    async fn get_task(&self, user_id: Uuid, task_id: Uuid) -> PortResult<Task> {
        sqlx::query_as::<_, TaskRecord>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND user_id = $2"
        ))
        .bind(task_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("Task", task_id))?
        .to_domain()
    }

    async fn create_task(&self, user_id: Uuid, text: &str, priority: Priority) -> PortResult<Task> {
        sqlx::query_as::<_, TaskRecord>(&format!(
            "INSERT INTO tasks (id, user_id, text, priority) VALUES ($1, $2, $3, $4) RETURNING {TASK_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(text)
        .bind(priority.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?
        .to_domain()
    }

    async fn update_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        update: &TaskUpdate,
    ) -> PortResult<Task> {
        sqlx::query_as::<_, TaskRecord>(&format!(
            "UPDATE tasks SET \
                text = COALESCE($3, text), \
                completed = COALESCE($4, completed), \
                priority = COALESCE($5, priority) \
             WHERE id = $1 AND user_id = $2 RETURNING {TASK_COLUMNS}"
        ))
        .bind(task_id)
        .bind(user_id)
        .bind(update.text.as_deref())
        .bind(update.completed)
        .bind(update.priority.map(|p| p.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("Task", task_id))?
        .to_domain()
    }

    async fn delete_task(&self, user_id: Uuid, task_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(task_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Task {} not found", task_id)));
        }
        Ok(())
    }

    // --- Documents ---

    async fn list_documents(&self, user_id: Uuid) -> PortResult<Vec<Document>> {
        let records = sqlx::query_as::<_, DocumentRecord>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE user_id = $1 ORDER BY uploaded_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(DocumentRecord::to_domain).collect()
    }

    async fn get_document(&self, user_id: Uuid, document_id: Uuid) -> PortResult<Document> {
        sqlx::query_as::<_, DocumentRecord>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND user_id = $2"
        ))
        .bind(document_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("Document", document_id))?
        .to_domain()
    }

    async fn create_document(&self, document: NewDocument) -> PortResult<Document> {
        sqlx::query_as::<_, DocumentRecord>(&format!(
            "INSERT INTO documents (id, user_id, name, content_type, url, storage_key, size_bytes, category) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(document.user_id)
        .bind(&document.name)
        .bind(&document.content_type)
        .bind(&document.url)
        .bind(document.storage_key.as_deref())
        .bind(document.size_bytes)
        .bind(document.category.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?
        .to_domain()
    }

    async fn delete_document(&self, user_id: Uuid, document_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1 AND user_id = $2")
            .bind(document_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Document {} not found",
                document_id
            )));
        }
        Ok(())
    }

    // --- AI-generated tasks ---

    async fn list_ai_tasks(&self, user_id: Uuid) -> PortResult<Vec<AiTask>> {
        let records = sqlx::query_as::<_, AiTaskRecord>(&format!(
            "SELECT {AI_TASK_COLUMNS} FROM ai_tasks WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(AiTaskRecord::to_domain).collect()
    }

    async fn list_ai_tasks_for_document(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> PortResult<Vec<AiTask>> {
        let records = sqlx::query_as::<_, AiTaskRecord>(&format!(
            "SELECT {AI_TASK_COLUMNS} FROM ai_tasks WHERE user_id = $1 AND document_id = $2 ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(AiTaskRecord::to_domain).collect()
    }

    async fn create_ai_task(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        text: &str,
        priority: Priority,
    ) -> PortResult<AiTask> {
        sqlx::query_as::<_, AiTaskRecord>(&format!(
            "INSERT INTO ai_tasks (id, user_id, document_id, text, priority, ai_generated) \
             VALUES ($1, $2, $3, $4, $5, TRUE) RETURNING {AI_TASK_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(document_id)
        .bind(text)
        .bind(priority.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?
        .to_domain()
    }

    async fn set_ai_task_completed(
        &self,
        user_id: Uuid,
        ai_task_id: Uuid,
        completed: bool,
    ) -> PortResult<AiTask> {
        sqlx::query_as::<_, AiTaskRecord>(&format!(
            "UPDATE ai_tasks SET completed = $3 WHERE id = $1 AND user_id = $2 RETURNING {AI_TASK_COLUMNS}"
        ))
        .bind(ai_task_id)
        .bind(user_id)
        .bind(completed)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("AI task", ai_task_id))?
        .to_domain()
    }

    async fn delete_ai_task(&self, user_id: Uuid, ai_task_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM ai_tasks WHERE id = $1 AND user_id = $2")
            .bind(ai_task_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("AI task {} not found", ai_task_id)));
        }
        Ok(())
    }
}
