//! Encyclopedia lookup tool

use std::sync::Arc;

use agent_core::{Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};
use async_trait::async_trait;

use super::reply;
use crate::model::ToolSettings;
use crate::source::LookupSource;
use crate::text::truncate_chars;

pub const NO_RESULTS: &str = "No good Wikipedia Search Result was found";

/// Summaries of the best matching Wikipedia pages
pub struct WikipediaTool {
    source: Arc<dyn LookupSource>,
    settings: ToolSettings,
}

impl WikipediaTool {
    pub fn new(source: Arc<dyn LookupSource>, settings: ToolSettings) -> Self {
        Self { source, settings }
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "wikipedia".into(),
            description: "A wrapper around Wikipedia. Useful for when you need to answer general \
                          questions about people, places, companies, facts, historical events, or \
                          other subjects. Input should be a search query."
                .into(),
            label: Some("Wikipedia".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let pages = self
            .source
            .lookup(call.input.trim(), self.settings.top_k_results)
            .await?;
        if pages.is_empty() {
            return Ok(reply(call, NO_RESULTS));
        }

        let text = pages
            .iter()
            .map(|page| format!("Page: {}\nSummary: {}", page.title, page.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(reply(call, truncate_chars(&text, self.settings.doc_content_chars_max)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;
    use crate::source::StaticSource;

    #[tokio::test]
    async fn test_formats_and_truncates() {
        let long = "Rust is a multi-paradigm language. ".repeat(40);
        let source = Arc::new(StaticSource::with_documents(vec![
            Document::new("Rust (programming language)", long),
            Document::new("Rust", "Iron oxide."),
        ]));
        let tool = WikipediaTool::new(source, ToolSettings::default());

        let result = tool.execute(&ToolCall::new("wikipedia", "rust")).await.unwrap();
        assert!(result.output.starts_with("Page: Rust (programming language)\nSummary: Rust is"));
        assert_eq!(result.output.chars().count(), 500);
        assert!(!result.output.contains("Iron oxide"));
    }

    #[tokio::test]
    async fn test_multiple_pages_joined() {
        let source = Arc::new(StaticSource::with_documents(vec![
            Document::new("A", "first"),
            Document::new("B", "second"),
        ]));
        let settings = ToolSettings {
            top_k_results: 2,
            ..ToolSettings::default()
        };
        let tool = WikipediaTool::new(source, settings);

        let result = tool.execute(&ToolCall::new("wikipedia", "x")).await.unwrap();
        assert_eq!(result.output, "Page: A\nSummary: first\n\nPage: B\nSummary: second");
    }

    #[tokio::test]
    async fn test_no_results_message() {
        let tool = WikipediaTool::new(Arc::new(StaticSource::new()), ToolSettings::default());
        let result = tool.execute(&ToolCall::new("wikipedia", "zzz")).await.unwrap();
        assert_eq!(result.output, NO_RESULTS);
    }
}
