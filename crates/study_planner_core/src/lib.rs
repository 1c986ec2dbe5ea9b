pub mod analysis;
pub mod documents;
pub mod domain;
pub mod filter;
pub mod ports;
pub mod text_actions;

pub use analysis::{fallback_analysis, AnalysisError, TaskAnalyzer};
pub use domain::{
    AiAnalysis, AiTask, AuthSession, Document, DocumentCategory, NewDocument, Priority, Task,
    TaskUpdate, User, UserCredentials,
};
pub use filter::{TaskCounts, TaskFilter};
pub use ports::{
    BlobStorageService, CompletionService, DatabaseService, PortError, PortResult, StoredBlob,
};
pub use text_actions::{extract_actions, SuggestedAction};
