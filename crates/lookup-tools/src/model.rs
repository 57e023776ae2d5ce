//! Lookup Data Model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One search hit, page or paper
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,

    /// Snippet, page summary or abstract
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
}

impl Document {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }
}

/// How many documents a tool fetches and how much text it returns
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolSettings {
    pub top_k_results: usize,
    pub doc_content_chars_max: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            top_k_results: 1,
            doc_content_chars_max: 500,
        }
    }
}

/// Endpoints and HTTP settings for the live sources
#[derive(Clone, Debug)]
pub struct LookupConfig {
    pub duckduckgo_url: String,
    pub wikipedia_api_url: String,
    pub arxiv_api_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            duckduckgo_url: "https://html.duckduckgo.com/html/".into(),
            wikipedia_api_url: "https://en.wikipedia.org/w/api.php".into(),
            arxiv_api_url: "https://export.arxiv.org/api/query".into(),
            timeout_secs: 20,
            user_agent: concat!("search-bot/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl LookupConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str, default: String| std::env::var(name).unwrap_or(default);

        Self {
            duckduckgo_url: var("DUCKDUCKGO_URL", defaults.duckduckgo_url),
            wikipedia_api_url: var("WIKIPEDIA_API_URL", defaults.wikipedia_api_url),
            arxiv_api_url: var("ARXIV_API_URL", defaults.arxiv_api_url),
            timeout_secs: std::env::var("LOOKUP_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            user_agent: defaults.user_agent,
        }
    }
}
