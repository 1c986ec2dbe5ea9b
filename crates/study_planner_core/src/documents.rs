//! crates/study_planner_core/src/documents.rs
//!
//! Document workflows written against the ports: upload (inline or blob
//! storage), AI task generation, document analysis and the best-effort
//! cascading delete.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::TaskAnalyzer;
use crate::domain::{AiAnalysis, AiTask, Document, DocumentCategory, NewDocument, Priority};
use crate::ports::{BlobStorageService, DatabaseService, PortError};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Files below this size are always stored inline.
pub const INLINE_THRESHOLD_BYTES: usize = 1024 * 1024;
/// Largest file that may fall back to inline storage when the blob store fails.
pub const INLINE_FALLBACK_MAX_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/jpg",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

const ALLOWED_EXTENSIONS: &[&str] = &[".pdf", ".jpg", ".jpeg", ".png", ".txt", ".doc", ".docx"];

/// A file received from the client.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("File {name} is too large. Maximum size is 10MB.")]
    TooLarge { name: String },
    #[error("File type {content_type} is not supported.")]
    UnsupportedType { content_type: String },
    #[error("File too large and storage upload failed: {0}")]
    Storage(PortError),
    #[error(transparent)]
    Port(#[from] PortError),
}

impl UploadError {
    /// Validation rejections only skip the offending file; other errors end the batch.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            UploadError::TooLarge { .. } | UploadError::UnsupportedType { .. }
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeletionError {
    /// Nothing was deleted.
    #[error("failed to look up the document's AI tasks: {0}")]
    Lookup(PortError),
    #[error("failed to delete document record: {0}")]
    Metadata(#[from] PortError),
}

/// What a document deletion actually managed to remove.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DeletionReport {
    pub blob_deleted: bool,
    pub ai_tasks_deleted: usize,
    pub ai_tasks_failed: usize,
}

//=========================================================================================
// Upload helpers
//=========================================================================================

pub fn validate_upload(name: &str, content_type: &str, size: usize) -> Result<(), UploadError> {
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            name: name.to_string(),
        });
    }
    let lower = name.to_lowercase();
    let known_type = ALLOWED_CONTENT_TYPES.contains(&content_type);
    let known_extension = ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext));
    if !known_type && !known_extension {
        return Err(UploadError::UnsupportedType {
            content_type: content_type.to_string(),
        });
    }
    Ok(())
}

/// `<timestamp>_<name>` with everything outside `[A-Za-z0-9.-]` replaced by `_`.
pub fn safe_file_name(name: &str, timestamp_ms: i64) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{timestamp_ms}_{cleaned}")
}

pub fn to_data_url(content_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(data))
}

/// Decodes a `data:<mime>;base64,<payload>` URL into its content type and bytes.
pub fn decode_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let content_type = header.strip_suffix(";base64")?;
    let data = STANDARD.decode(payload).ok()?;
    Some((content_type.to_string(), data))
}

pub fn blob_key(user_id: Uuid, safe_name: &str) -> String {
    format!("documents/{user_id}/{safe_name}")
}

//=========================================================================================
// Prompts and fallback tasks
//=========================================================================================

pub fn document_context_prompt(file_name: &str, category: DocumentCategory) -> String {
    let base = format!("I've uploaded a document \"{file_name}\" of type \"{category}\".");
    match category {
        DocumentCategory::Certificate => format!("{base} This is a certificate document. What tasks should I complete to effectively use this certificate for job applications, portfolio building, or skill verification?"),
        DocumentCategory::Resume => format!("{base} This is my resume/CV. What tasks should I do to improve, update, or effectively use this resume for job applications?"),
        DocumentCategory::Transcript => format!("{base} This is an academic transcript. What tasks should I complete to leverage this transcript for applications, career advancement, or further education?"),
        DocumentCategory::Id => format!("{base} This is an identification document. What organizational or administrative tasks should I complete related to this document?"),
        DocumentCategory::Other => format!("{base} What relevant tasks should I complete related to this document for organization, processing, or follow-up actions?"),
    }
}

pub fn fallback_tasks(file_name: &str, category: DocumentCategory) -> Vec<String> {
    let mut tasks = vec![
        format!("Review and organize {file_name}"),
        format!("Ensure {file_name} is up to date"),
    ];
    let extra: &[&str] = match category {
        DocumentCategory::Certificate => &[
            "Add certificate to portfolio",
            "Update resume with new certification",
            "Share achievement on professional networks",
        ],
        DocumentCategory::Resume => &[
            "Review resume for accuracy and relevance",
            "Tailor resume for specific job applications",
            "Update contact information and skills",
        ],
        DocumentCategory::Transcript => &[
            "Verify transcript accuracy",
            "Use transcript for academic applications",
            "Calculate GPA if needed",
        ],
        DocumentCategory::Id => &[
            "Store document securely",
            "Create backup copies",
            "Note expiration date if applicable",
        ],
        DocumentCategory::Other => &["File document appropriately", "Create backup if important"],
    };
    tasks.extend(extra.iter().map(|t| t.to_string()));
    tasks
}

//=========================================================================================
// Workflows
//=========================================================================================

/// Stores one file and its metadata record, then generates its AI tasks.
pub async fn upload_document(
    db: &dyn DatabaseService,
    blobs: &dyn BlobStorageService,
    analyzer: &TaskAnalyzer,
    user_id: Uuid,
    upload: FileUpload,
    category: DocumentCategory,
) -> Result<Document, UploadError> {
    let size = upload.data.len();
    validate_upload(&upload.name, &upload.content_type, size)?;

    let safe_name = safe_file_name(&upload.name, chrono::Utc::now().timestamp_millis());

    let (url, storage_key) = if size < INLINE_THRESHOLD_BYTES {
        (to_data_url(&upload.content_type, &upload.data), None)
    } else {
        let key = blob_key(user_id, &safe_name);
        let metadata = HashMap::from([
            ("originalName".to_string(), upload.name.clone()),
            ("uploadedBy".to_string(), user_id.to_string()),
            ("category".to_string(), category.to_string()),
        ]);
        match blobs
            .put(&key, &upload.data, &upload.content_type, &metadata)
            .await
        {
            Ok(url) => (url, Some(key)),
            Err(e) if size < INLINE_FALLBACK_MAX_BYTES => {
                warn!(error = %e, key = %key, "Blob upload failed, falling back to inline storage");
                (to_data_url(&upload.content_type, &upload.data), None)
            }
            Err(e) => return Err(UploadError::Storage(e)),
        }
    };

    let document = db
        .create_document(NewDocument {
            user_id,
            name: upload.name,
            content_type: upload.content_type,
            url,
            storage_key,
            size_bytes: size as i64,
            category,
        })
        .await?;
    info!(document_id = %document.id, size, inline = document.is_inline(), "Document stored");

    generate_tasks_for_document(db, analyzer, &document).await;
    Ok(document)
}

/// Result of storing several files in one request.
#[derive(Debug, Default)]
pub struct UploadBatch {
    pub stored: Vec<Document>,
    /// Files skipped for their size or type.
    pub rejected: Vec<(String, UploadError)>,
    /// The file whose failure stopped the batch. Later files were not attempted.
    pub failed: Option<(String, UploadError)>,
}

/// Stores the files in order. Rejections skip one file, any other error ends the batch.
pub async fn upload_batch(
    db: &dyn DatabaseService,
    blobs: &dyn BlobStorageService,
    analyzer: &TaskAnalyzer,
    user_id: Uuid,
    uploads: Vec<FileUpload>,
    category: DocumentCategory,
) -> UploadBatch {
    let mut batch = UploadBatch::default();
    for upload in uploads {
        let name = upload.name.clone();
        match upload_document(db, blobs, analyzer, user_id, upload, category).await {
            Ok(document) => batch.stored.push(document),
            Err(e) if e.is_rejection() => {
                warn!(file = %name, reason = %e, "Upload rejected");
                batch.rejected.push((name, e));
            }
            Err(e) => {
                error!(file = %name, error = %e, "Upload failed, stopping batch");
                batch.failed = Some((name, e));
                break;
            }
        }
    }
    batch
}

/// Creates one medium-priority AI task per suggested step. The analysis never
/// fails (the generic fallback steps stand in), but if storing a task fails the
/// remaining steps are dropped and the category's fallback tasks are created
/// instead. Existing tasks are never deduplicated.
pub async fn generate_tasks_for_document(
    db: &dyn DatabaseService,
    analyzer: &TaskAnalyzer,
    document: &Document,
) -> Vec<AiTask> {
    let prompt = document_context_prompt(&document.name, document.category);
    let analysis = analyzer.analyze(&prompt, Priority::High).await;

    let mut created = Vec::with_capacity(analysis.suggested_steps.len());
    for text in &analysis.suggested_steps {
        match db
            .create_ai_task(document.user_id, document.id, text, Priority::Medium)
            .await
        {
            Ok(task) => created.push(task),
            Err(e) => {
                error!(document_id = %document.id, error = %e, "AI task creation failed, using fallback tasks");
                create_fallback_tasks(db, document, &mut created).await;
                break;
            }
        }
    }
    info!(document_id = %document.id, count = created.len(), "AI tasks created");
    created
}

async fn create_fallback_tasks(
    db: &dyn DatabaseService,
    document: &Document,
    created: &mut Vec<AiTask>,
) {
    for text in fallback_tasks(&document.name, document.category) {
        match db
            .create_ai_task(document.user_id, document.id, &text, Priority::Medium)
            .await
        {
            Ok(task) => created.push(task),
            Err(e) => error!(document_id = %document.id, error = %e, "Failed to create fallback task"),
        }
    }
}

/// Analyzes a document through its AI tasks, generating them first if there are none.
/// The returned text is what was sent for analysis.
pub async fn analyze_document(
    db: &dyn DatabaseService,
    analyzer: &TaskAnalyzer,
    document: &Document,
) -> Result<(String, AiAnalysis), PortError> {
    let mut related = db
        .list_ai_tasks_for_document(document.user_id, document.id)
        .await?;
    if related.is_empty() {
        related = generate_tasks_for_document(db, analyzer, document).await;
    }

    let mut text = related
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(". ");
    if text.is_empty() {
        text = document_context_prompt(&document.name, document.category);
    }

    let analysis = analyzer.analyze(&text, Priority::High).await;
    Ok((text, analysis))
}

/// Looks up the document's AI tasks, then deletes the blob (best effort), the
/// metadata record and every one of those tasks. Nothing is rolled back on
/// partial failure; a failed lookup stops before anything is deleted.
pub async fn delete_document(
    db: &dyn DatabaseService,
    blobs: &dyn BlobStorageService,
    document: &Document,
) -> Result<DeletionReport, DeletionError> {
    let related = db
        .list_ai_tasks_for_document(document.user_id, document.id)
        .await
        .map_err(DeletionError::Lookup)?;

    let mut report = DeletionReport::default();

    if let Some(key) = document.storage_key.as_deref().filter(|_| !document.is_inline()) {
        match blobs.delete(key).await {
            Ok(()) => report.blob_deleted = true,
            Err(e) => {
                warn!(document_id = %document.id, key = %key, error = %e, "Blob delete failed (may not exist), continuing")
            }
        }
    }

    db.delete_document(document.user_id, document.id).await?;

    for task in related {
        match db.delete_ai_task(document.user_id, task.id).await {
            Ok(()) => report.ai_tasks_deleted += 1,
            Err(e) => {
                report.ai_tasks_failed += 1;
                error!(ai_task_id = %task.id, error = %e, "Failed to delete AI task");
            }
        }
    }

    info!(document_id = %document.id, ?report, "Document deleted");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_size_limit() {
        assert!(validate_upload("a.pdf", "application/pdf", MAX_UPLOAD_BYTES).is_ok());
        let err = validate_upload("a.pdf", "application/pdf", MAX_UPLOAD_BYTES + 1).unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { .. }));
        assert!(err.is_rejection());
    }

    #[test]
    fn upload_type_by_mime_or_extension() {
        assert!(validate_upload("scan", "image/png", 10).is_ok());
        assert!(validate_upload("CV.DOCX", "application/octet-stream", 10).is_ok());
        let err = validate_upload("song.mp3", "audio/mpeg", 10).unwrap_err();
        assert_eq!(err.to_string(), "File type audio/mpeg is not supported.");
    }

    #[test]
    fn safe_names_replace_unusual_characters() {
        assert_eq!(
            safe_file_name("My CV (final).pdf", 1700000000000),
            "1700000000000_My_CV__final_.pdf"
        );
    }

    #[test]
    fn data_urls_decode_back() {
        let url = to_data_url("text/plain", b"hello");
        assert_eq!(url, "data:text/plain;base64,aGVsbG8=");
        let (mime, data) = decode_data_url(&url).unwrap();
        assert_eq!(mime, "text/plain");
        assert_eq!(data, b"hello");
        assert!(decode_data_url("https://example.com/a.pdf").is_none());
    }

    #[test]
    fn fallback_tasks_per_category() {
        let tasks = fallback_tasks("cv.pdf", DocumentCategory::Resume);
        assert_eq!(tasks.len(), 5);
        assert_eq!(tasks[0], "Review and organize cv.pdf");
        assert_eq!(tasks[1], "Ensure cv.pdf is up to date");
        assert_eq!(fallback_tasks("x", DocumentCategory::Other).len(), 4);
    }

    #[test]
    fn context_prompt_names_file_and_category() {
        let prompt = document_context_prompt("grades.pdf", DocumentCategory::Transcript);
        assert!(prompt.starts_with("I've uploaded a document \"grades.pdf\" of type \"transcript\"."));
        assert!(prompt.contains("academic transcript"));
    }
}
