//! DuckDuckGo web search via the no-JavaScript HTML endpoint

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::{check_status, LookupSource};
use crate::error::Result;
use crate::model::Document;
use crate::text::{decode_entities, plain};

static RESULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<a([^>]*?class="result__a"[^>]*)>(.*?)</a>.*?class="result__snippet"[^>]*>(.*?)</(?:a|td|div)>"#,
    )
    .expect("static regex")
});

static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]*)""#).expect("static regex"));

/// DuckDuckGo HTML search client
pub struct DuckDuckGoClient {
    client: reqwest::Client,
    url: String,
    region: String,
    safesearch: SafeSearch,
    time: Option<String>,
}

/// DuckDuckGo safe-search level
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SafeSearch {
    Strict,
    #[default]
    Moderate,
    Off,
}

impl SafeSearch {
    const fn param(self) -> &'static str {
        match self {
            SafeSearch::Strict => "1",
            SafeSearch::Moderate => "-1",
            SafeSearch::Off => "-2",
        }
    }
}

impl DuckDuckGoClient {
    /// Worldwide region, moderate safe search, results from the past year
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            region: "wt-wt".into(),
            safesearch: SafeSearch::default(),
            time: Some("y".into()),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_safesearch(mut self, safesearch: SafeSearch) -> Self {
        self.safesearch = safesearch;
        self
    }

    /// Restrict to a period: `d`, `w`, `m`, `y`, or `None` for any time
    pub fn with_time(mut self, time: Option<String>) -> Self {
        self.time = time;
        self
    }
}

/// Result blocks from a results page, in page order
fn parse_results(html: &str, limit: usize) -> Vec<Document> {
    RESULT_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let attrs = caps.get(1)?.as_str();
            let title = plain(caps.get(2)?.as_str());
            let snippet = plain(caps.get(3)?.as_str());
            if snippet.is_empty() {
                return None;
            }
            let url = HREF_RE
                .captures(attrs)
                .and_then(|h| h.get(1))
                .map(|m| decode_entities(m.as_str()));
            Some(Document {
                url,
                ..Document::new(title, snippet)
            })
        })
        .take(limit)
        .collect()
}

#[async_trait]
impl LookupSource for DuckDuckGoClient {
    async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        let mut form = vec![
            ("q", query.to_string()),
            ("kl", self.region.clone()),
            ("kp", self.safesearch.param().to_string()),
        ];
        if let Some(time) = &self.time {
            form.push(("df", time.clone()));
        }

        let response = self.client.post(&self.url).form(&form).send().await?;
        let html = check_status(self.name(), response)?.text().await?;

        let results = parse_results(&html, limit);
        tracing::debug!(query, hits = results.len(), "DuckDuckGo search");
        Ok(results)
    }

    fn name(&self) -> &str {
        "DuckDuckGo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
<div class="result results_links results_links_deep web-result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="https://www.rust-lang.org/">Rust Programming <b>Language</b></a>
  </h2>
  <a class="result__snippet" href="https://www.rust-lang.org/">A language empowering everyone to build reliable &amp; efficient software.</a>
</div>
<div class="result results_links results_links_deep web-result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="https://en.wikipedia.org/wiki/Rust_(programming_language)">Rust - Wikipedia</a>
  </h2>
  <a class="result__snippet" href="https://en.wikipedia.org/wiki/Rust_(programming_language)">Rust is a general-purpose <b>programming</b> language.</a>
</div>"#;

    #[test]
    fn test_parse_results() {
        let docs = parse_results(PAGE, 5);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].title, "Rust Programming Language");
        assert_eq!(
            docs[0].content,
            "A language empowering everyone to build reliable & efficient software."
        );
        assert_eq!(docs[0].url.as_deref(), Some("https://www.rust-lang.org/"));
        assert_eq!(docs[1].content, "Rust is a general-purpose programming language.");

        assert_eq!(parse_results(PAGE, 1).len(), 1);
        assert!(parse_results("<html>No results.</html>", 5).is_empty());
    }

    #[tokio::test]
    async fn test_lookup_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("q=rust+language"))
            .and(body_string_contains("kl=wt-wt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let client = DuckDuckGoClient::new(reqwest::Client::new(), format!("{}/html/", server.uri()));
        let docs = client.lookup("rust language", 5).await.unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_blocked_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = DuckDuckGoClient::new(reqwest::Client::new(), server.uri());
        let err = client.lookup("anything", 5).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 403"));
    }
}
