//! Lookup Sources
//!
//! Backends the tools query. Each live client owns a shared `reqwest::Client`
//! and an endpoint URL so tests can point it at a mock server.

mod arxiv;
mod duckduckgo;
mod fixture;
mod wikipedia;

pub use arxiv::ArxivClient;
pub use duckduckgo::DuckDuckGoClient;
pub use fixture::StaticSource;
pub use wikipedia::WikipediaClient;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{LookupError, Result};
use crate::model::{Document, LookupConfig};

/// Lookup backend trait (Strategy pattern)
#[async_trait]
pub trait LookupSource: Send + Sync {
    /// At most `limit` documents for `query`, best first
    async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<Document>>;

    /// Source name for logs and errors
    fn name(&self) -> &str;
}

/// HTTP client shared by the live sources
pub fn build_client(config: &LookupConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| LookupError::Config(format!("HTTP client: {e}")))
}

/// Fail on non-2xx, naming the source
fn check_status(source_name: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(LookupError::Status {
            source_name: source_name.to_string(),
            status: status.as_u16(),
        })
    }
}
