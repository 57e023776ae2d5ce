//! Paper search tool

use std::sync::Arc;

use agent_core::{Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};
use async_trait::async_trait;

use super::reply;
use crate::model::{Document, ToolSettings};
use crate::source::LookupSource;
use crate::text::truncate_chars;

pub const NO_RESULTS: &str = "No good Arxiv Result was found";

/// The API rejects longer queries
const MAX_QUERY_CHARS: usize = 300;

/// Metadata and abstract of the best matching Arxiv papers
pub struct ArxivTool {
    source: Arc<dyn LookupSource>,
    settings: ToolSettings,
}

impl ArxivTool {
    pub fn new(source: Arc<dyn LookupSource>, settings: ToolSettings) -> Self {
        Self { source, settings }
    }
}

fn render(paper: &Document) -> String {
    let published = paper
        .published
        .map(|day| day.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    format!(
        "Published: {published}\nTitle: {}\nAuthors: {}\nSummary: {}",
        paper.title,
        paper.authors.join(", "),
        paper.content
    )
}

#[async_trait]
impl Tool for ArxivTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "arxiv".into(),
            description: "A wrapper around Arxiv.org Useful for when you need to answer questions \
                          about Physics, Mathematics, Computer Science, Quantitative Biology, \
                          Quantitative Finance, Statistics, Electrical Engineering, and Economics \
                          from scientific articles on arxiv.org. Input should be a search query."
                .into(),
            label: Some("Arxiv".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let query = truncate_chars(call.input.trim(), MAX_QUERY_CHARS);

        // Lookup failures become the observation rather than an error
        let papers = match self.source.lookup(query, self.settings.top_k_results).await {
            Ok(papers) => papers,
            Err(e) => {
                tracing::warn!(error = %e, "Arxiv lookup failed");
                return Ok(reply(call, format!("Arxiv exception: {e}")));
            }
        };
        if papers.is_empty() {
            return Ok(reply(call, NO_RESULTS));
        }

        let text = papers.iter().map(render).collect::<Vec<_>>().join("\n\n");
        Ok(reply(call, truncate_chars(&text, self.settings.doc_content_chars_max)))
    }
}
