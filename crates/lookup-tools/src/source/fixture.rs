//! Fixed-answer source for demos and tests

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::LookupSource;
use crate::error::{LookupError, Result};
use crate::model::Document;

/// Returns the same documents for every query and remembers what it was asked
#[derive(Default)]
pub struct StaticSource {
    documents: Vec<Document>,
    failure: Option<String>,
    queries: Mutex<Vec<String>>,
}

impl StaticSource {
    /// A source with no documents
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self {
            documents,
            ..Self::default()
        }
    }

    /// Every lookup fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Queries received so far, oldest first
    pub async fn queries(&self) -> Vec<String> {
        self.queries.lock().await.clone()
    }
}

#[async_trait]
impl LookupSource for StaticSource {
    async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        self.queries.lock().await.push(query.to_string());
        if let Some(message) = &self.failure {
            return Err(LookupError::Unavailable(message.clone()));
        }
        Ok(self.documents.iter().take(limit).cloned().collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limit_and_recording() {
        let source = StaticSource::with_documents(vec![
            Document::new("a", "first"),
            Document::new("b", "second"),
        ]);
        assert_eq!(source.lookup("one", 1).await.unwrap().len(), 1);
        assert_eq!(source.lookup("two", 5).await.unwrap().len(), 2);
        assert_eq!(source.queries().await, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_failing() {
        let source = StaticSource::failing("offline");
        let err = source.lookup("q", 1).await.unwrap_err();
        assert_eq!(err.to_string(), "offline");
    }
}
