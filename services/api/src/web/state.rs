//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::realtime::ChangeHub;
use std::sync::Arc;
use study_planner_core::analysis::TaskAnalyzer;
use study_planner_core::ports::{BlobStorageService, DatabaseService};

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub blobs: Arc<dyn BlobStorageService>,
    pub analyzer: TaskAnalyzer,
    pub config: Arc<Config>,
    /// Fan-out of data changes to live WebSocket subscriptions.
    pub changes: ChangeHub,
}
