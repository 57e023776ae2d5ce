//! Application State

use std::sync::Arc;

use agent_core::{MemorySessionStore, ProviderFactory, ToolRegistry};

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Live chat sessions, keyed by the id the browser keeps
    pub sessions: Arc<MemorySessionStore>,

    /// Search, arxiv and wikipedia
    pub tools: Arc<ToolRegistry>,

    /// Builds a model client from a session's API key
    pub providers: Arc<dyn ProviderFactory>,

    pub config: Arc<ServerConfig>,
}
