pub mod analysis_llm;
pub mod blob;
pub mod db;

pub use analysis_llm::OpenAiCompletionAdapter;
pub use blob::FsBlobStore;
pub use db::DbAdapter;
