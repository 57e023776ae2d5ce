//! Web search tool

use std::sync::Arc;

use agent_core::{Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};
use async_trait::async_trait;

use super::reply;
use crate::source::LookupSource;

pub const NO_RESULTS: &str = "No good DuckDuckGo Search Result was found";

/// Snippets from the top web results, joined by spaces
pub struct SearchTool {
    source: Arc<dyn LookupSource>,
    max_results: usize,
}

impl SearchTool {
    pub fn new(source: Arc<dyn LookupSource>) -> Self {
        Self {
            source,
            max_results: 5,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "Search".into(),
            description: "A wrapper around DuckDuckGo Search. Useful for when you need to answer \
                          questions about current events. Input should be a search query."
                .into(),
            label: Some("DuckDuckGo".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let hits = self.source.lookup(call.input.trim(), self.max_results).await?;
        if hits.is_empty() {
            return Ok(reply(call, NO_RESULTS));
        }
        let snippets: Vec<&str> = hits.iter().map(|doc| doc.content.as_str()).collect();
        Ok(reply(call, snippets.join(" ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;
    use crate::source::StaticSource;
    use agent_core::AgentError;

    fn docs(n: usize) -> Vec<Document> {
        (1..=n)
            .map(|i| Document::new(format!("t{i}"), format!("snippet {i}.")))
            .collect()
    }

    #[tokio::test]
    async fn test_joins_top_five_snippets() {
        let source = Arc::new(StaticSource::with_documents(docs(7)));
        let tool = SearchTool::new(source.clone());

        let call = ToolCall::new("Search", "  rust 2024 edition ");
        let result = tool.execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.id, call.id);
        assert_eq!(
            result.output,
            "snippet 1. snippet 2. snippet 3. snippet 4. snippet 5."
        );
        assert_eq!(source.queries().await, vec!["rust 2024 edition"]);
    }

    #[tokio::test]
    async fn test_no_results_message() {
        let tool = SearchTool::new(Arc::new(StaticSource::new()));
        let result = tool.execute(&ToolCall::new("Search", "q")).await.unwrap();
        assert_eq!(result.output, NO_RESULTS);
    }

    #[tokio::test]
    async fn test_source_failure_is_tool_error() {
        let tool = SearchTool::new(Arc::new(StaticSource::failing("ratelimited")));
        let err = tool.execute(&ToolCall::new("Search", "q")).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolExecution(msg) if msg == "ratelimited"));
    }
}
