//! crates/study_planner_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Users and Auth
//=========================================================================================

// Represents a user - used throughout app
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Tasks
//=========================================================================================

/// How urgent a to-do item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored or submitted enum label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(UnknownVariant {
                kind: "priority",
                value: s.to_string(),
            }),
        }
    }
}

/// A user-created to-do item.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub completed: bool,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

/// Field updates applied to a task. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub text: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.completed.is_none() && self.priority.is_none()
    }
}

//=========================================================================================
// Documents
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentCategory {
    Certificate,
    Resume,
    Transcript,
    Id,
    #[default]
    Other,
}

impl DocumentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::Certificate => "certificate",
            DocumentCategory::Resume => "resume",
            DocumentCategory::Transcript => "transcript",
            DocumentCategory::Id => "id",
            DocumentCategory::Other => "other",
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "certificate" => Ok(DocumentCategory::Certificate),
            "resume" => Ok(DocumentCategory::Resume),
            "transcript" => Ok(DocumentCategory::Transcript),
            "id" => Ok(DocumentCategory::Id),
            "other" => Ok(DocumentCategory::Other),
            _ => Err(UnknownVariant {
                kind: "document category",
                value: s.to_string(),
            }),
        }
    }
}

/// An uploaded file record.
///
/// `url` is either a retrievable blob URL or an inline `data:` URL. Only
/// blob-backed documents carry a `storage_key`.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub content_type: String,
    pub url: String,
    pub storage_key: Option<String>,
    pub size_bytes: i64,
    pub category: DocumentCategory,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    pub fn is_inline(&self) -> bool {
        self.url.starts_with("data:")
    }
}

/// The fields needed to insert a document record.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub user_id: Uuid,
    pub name: String,
    pub content_type: String,
    pub url: String,
    pub storage_key: Option<String>,
    pub size_bytes: i64,
    pub category: DocumentCategory,
}

/// A to-do item produced from an AI analysis of a document.
#[derive(Debug, Clone, Serialize)]
pub struct AiTask {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub text: String,
    pub completed: bool,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub ai_generated: bool,
}

//=========================================================================================
// AI Analysis (ephemeral, never persisted)
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Article,
    Video,
    Documentation,
    Course,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

/// A suggested external link or tool proposed by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextualAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub label: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The structured reply of an AI task analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub summary: String,
    pub suggested_steps: Vec<String>,
    pub estimated_time: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contextual_actions: Option<Vec<ContextualAction>>,
}
