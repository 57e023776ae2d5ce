//! # lookup-tools
//!
//! The three lookup capabilities the search bot's agent can call:
//!
//! ```text
//! ┌────────────┬────────────────────────────┬──────────────────────────────┐
//! │ Tool name  │ Source                     │ Output                       │
//! ├────────────┼────────────────────────────┼──────────────────────────────┤
//! │ Search     │ DuckDuckGo HTML endpoint   │ top 5 snippets, space-joined │
//! │ arxiv      │ Arxiv Atom API             │ top paper, ≤ 500 chars       │
//! │ wikipedia  │ MediaWiki search + extract │ top page summary, ≤ 500 chars│
//! └────────────┴────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! Each tool wraps a `LookupSource`, so tests and demos can swap the HTTP
//! clients for a `StaticSource`.

pub mod error;
pub mod model;
pub mod source;
pub mod text;
pub mod tools;

use std::sync::Arc;

use agent_core::ToolRegistry;

pub use error::{LookupError, Result};
pub use model::{Document, LookupConfig, ToolSettings};
pub use source::{ArxivClient, DuckDuckGoClient, LookupSource, StaticSource, WikipediaClient};
pub use tools::{ArxivTool, SearchTool, WikipediaTool};

/// Display names of the tools, for captions
pub const TOOL_LABELS: [&str; 3] = ["DuckDuckGo", "Wikipedia", "Arxiv"];

/// Register Search, arxiv and wikipedia (in that order) over live HTTP sources
pub fn default_registry(config: &LookupConfig) -> Result<ToolRegistry> {
    let client = source::build_client(config)?;

    let search = DuckDuckGoClient::new(client.clone(), config.duckduckgo_url.clone());
    let wikipedia = WikipediaClient::new(client.clone(), config.wikipedia_api_url.clone());
    let arxiv = ArxivClient::new(client, config.arxiv_api_url.clone());

    let mut tools = ToolRegistry::new();
    tools.register(SearchTool::new(Arc::new(search)));
    tools.register(ArxivTool::new(Arc::new(arxiv), ToolSettings::default()));
    tools.register(WikipediaTool::new(Arc::new(wikipedia), ToolSettings::default()));

    tracing::debug!(tools = ?tools.names(), "Lookup tools ready");
    Ok(tools)
}

/// Same tools over fixed sources; no network access
pub fn offline_registry(source: Arc<StaticSource>) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(SearchTool::new(source.clone()));
    tools.register(ArxivTool::new(source.clone(), ToolSettings::default()));
    tools.register(WikipediaTool::new(source, ToolSettings::default()));
    tools
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_order() {
        let tools = default_registry(&LookupConfig::default()).unwrap();
        assert_eq!(tools.names(), vec!["Search", "arxiv", "wikipedia"]);
    }

    #[test]
    fn test_labels_match_tools() {
        let tools = offline_registry(Arc::new(StaticSource::new()));
        let labels: Vec<String> = tools
            .schemas()
            .into_iter()
            .filter_map(|s| s.label)
            .collect();
        assert_eq!(labels, vec!["DuckDuckGo", "Arxiv", "Wikipedia"]);
        for label in TOOL_LABELS {
            assert!(labels.iter().any(|l| l == label));
        }
    }
}
