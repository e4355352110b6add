use std::sync::Arc;

use crate::config::Config;
use crate::conversation::engine::ConversationEngine;
use crate::dispatch::WorkerPool;
use crate::store::CandidateStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<ConversationEngine>,
    /// Bounds how many messages are processed at once.
    pub workers: WorkerPool,
    /// Write side used by the ingestion endpoint; the engine reads through its own handle.
    pub candidates: Arc<dyn CandidateStore>,
}
