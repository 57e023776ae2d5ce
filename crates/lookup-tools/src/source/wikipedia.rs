//! Wikipedia page summaries via the MediaWiki Action API

use async_trait::async_trait;
use serde::Deserialize;

use super::{check_status, LookupSource};
use crate::error::{LookupError, Result};
use crate::model::Document;
use crate::text::truncate_chars;

/// MediaWiki rejects longer search strings
const MAX_QUERY_CHARS: usize = 300;

/// MediaWiki search + intro-extract client
pub struct WikipediaClient {
    client: reqwest::Client,
    api_url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: Vec<Page>,
    #[serde(default)]
    redirects: Vec<Redirect>,
}

#[derive(Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    pageid: Option<u64>,
}

#[derive(Deserialize)]
struct Redirect {
    from: String,
    to: String,
}

impl WikipediaClient {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    async fn search_titles(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let limit = limit.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("srprop", ""),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .send()
            .await?;
        let body: SearchResponse = check_status(self.name(), response)?
            .json()
            .await
            .map_err(|e| self.parse_error(e))?;

        Ok(body
            .query
            .map(|q| q.search.into_iter().map(|hit| hit.title).collect())
            .unwrap_or_default())
    }

    async fn summaries(&self, titles: &[String]) -> Result<Vec<Document>> {
        let joined = titles.join("|");
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", joined.as_str()),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .send()
            .await?;
        let body: ExtractResponse = check_status(self.name(), response)?
            .json()
            .await
            .map_err(|e| self.parse_error(e))?;
        let Some(query) = body.query else {
            return Ok(Vec::new());
        };

        // Pages come back in arbitrary order; keep search ranking
        let resolve = |title: &String| {
            query
                .redirects
                .iter()
                .find(|r| &r.from == title)
                .map_or(title.as_str(), |r| r.to.as_str())
                .to_string()
        };
        let docs = titles
            .iter()
            .map(resolve)
            .filter_map(|title| query.pages.iter().find(|p| p.title == title))
            .filter(|page| !page.missing)
            .filter_map(|page| {
                let extract = page.extract.as_deref()?.trim();
                if extract.is_empty() {
                    return None;
                }
                let url = page
                    .pageid
                    .map(|id| format!("https://en.wikipedia.org/?curid={id}"));
                Some(Document {
                    url,
                    ..Document::new(page.title.clone(), extract)
                })
            })
            .collect();
        Ok(docs)
    }

    fn parse_error(&self, err: reqwest::Error) -> LookupError {
        LookupError::Parse {
            source_name: self.name().to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl LookupSource for WikipediaClient {
    async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        let query = truncate_chars(query, MAX_QUERY_CHARS);
        let titles = self.search_titles(query, limit).await?;
        if titles.is_empty() {
            return Ok(Vec::new());
        }
        let docs = self.summaries(&titles).await?;
        tracing::debug!(query, hits = docs.len(), "Wikipedia lookup");
        Ok(docs)
    }

    fn name(&self) -> &str {
        "Wikipedia"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_wiki() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("list", "search"))
            .and(query_param("srsearch", "ferris crab"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": { "search": [ { "title": "Ferris" }, { "title": "Crab" } ] }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("prop", "extracts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {
                    "redirects": [ { "from": "Ferris", "to": "Ferris the Crab" } ],
                    "pages": [
                        { "title": "Crab", "pageid": 2, "extract": "Crabs are decapod crustaceans." },
                        { "title": "Ferris the Crab", "pageid": 1, "extract": "Ferris is the unofficial Rust mascot." }
                    ]
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("list", "search"))
            .and(query_param("srsearch", "zzzz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": { "search": [] }
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_lookup_keeps_search_order_through_redirects() {
        let server = mock_wiki().await;
        let client = WikipediaClient::new(reqwest::Client::new(), server.uri());

        let docs = client.lookup("ferris crab", 2).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].title, "Ferris the Crab");
        assert_eq!(docs[0].content, "Ferris is the unofficial Rust mascot.");
        assert_eq!(docs[0].url.as_deref(), Some("https://en.wikipedia.org/?curid=1"));
        assert_eq!(docs[1].title, "Crab");
    }

    #[tokio::test]
    async fn test_no_hits_skips_extract_request() {
        let server = mock_wiki().await;
        let client = WikipediaClient::new(reqwest::Client::new(), server.uri());

        let docs = client.lookup("zzzz", 1).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let client = WikipediaClient::new(reqwest::Client::new(), server.uri());

        let err = client.lookup("anything", 1).await.unwrap_err();
        assert!(matches!(err, LookupError::Status { status: 503, .. }));
    }
}
