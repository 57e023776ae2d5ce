//! Arxiv paper search via the Atom export API

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;

use super::{check_status, LookupSource};
use crate::error::{LookupError, Result};
use crate::model::Document;
use crate::text::{decode_entities, squash_whitespace};

static ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("static regex"));

static AUTHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").expect("static regex")
});

/// New-style (`2101.00001v2`) or old-style (`hep-th/9901001`, `9901001`) ids
static ARXIV_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{2}(?:0[1-9]|1[0-2])\.\d{4,5}(?:v\d+)?|(?:[a-z\-]+(?:\.[A-Z]{2})?/)?\d{7}(?:v\d+)?)$")
        .expect("static regex")
});

/// Arxiv export API client
pub struct ArxivClient {
    client: reqwest::Client,
    api_url: String,
}

impl ArxivClient {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }
}

/// True when every whitespace-separated word is an arxiv id
pub fn is_arxiv_identifier(query: &str) -> bool {
    let mut words = query.split_whitespace().peekable();
    words.peek().is_some() && words.all(|w| ARXIV_ID_RE.is_match(w))
}

/// Text of the first `<tag>` element in `xml`
fn element<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let start = xml.find(&open)?;
    let body_start = start + xml[start..].find('>')? + 1;
    let end = body_start + xml[body_start..].find(&close)?;
    Some(&xml[body_start..end])
}

fn text_of(xml: &str, tag: &str) -> String {
    element(xml, tag)
        .map(|raw| squash_whitespace(&decode_entities(raw)))
        .unwrap_or_default()
}

/// `<entry>` elements of an Atom feed
fn parse_feed(xml: &str) -> Result<Vec<Document>> {
    let mut docs = Vec::new();
    for caps in ENTRY_RE.captures_iter(xml) {
        let entry = caps.get(1).map_or("", |m| m.as_str());
        let id = text_of(entry, "id");

        // The API reports bad queries as a single feed entry
        if id.contains("/api/errors") {
            return Err(LookupError::Parse {
                source_name: "Arxiv".into(),
                reason: text_of(entry, "summary"),
            });
        }

        let published = element(entry, "updated")
            .or_else(|| element(entry, "published"))
            .and_then(|ts| ts.trim().get(..10))
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok());
        let authors = AUTHOR_RE
            .captures_iter(entry)
            .filter_map(|a| a.get(1))
            .map(|name| squash_whitespace(&decode_entities(name.as_str())))
            .collect();

        docs.push(Document {
            url: (!id.is_empty()).then_some(id),
            published,
            authors,
            ..Document::new(text_of(entry, "title"), text_of(entry, "summary"))
        });
    }
    Ok(docs)
}

#[async_trait]
impl LookupSource for ArxivClient {
    async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        let limit = limit.to_string();
        let key = if is_arxiv_identifier(query) {
            "id_list"
        } else {
            "search_query"
        };
        let query = if key == "id_list" {
            query.split_whitespace().collect::<Vec<_>>().join(",")
        } else {
            query.to_string()
        };

        let response = self
            .client
            .get(&self.api_url)
            .query(&[(key, query.as_str()), ("start", "0"), ("max_results", limit.as_str())])
            .send()
            .await?;
        let xml = check_status(self.name(), response)?.text().await?;

        let docs = parse_feed(&xml)?;
        tracing::debug!(query = %query, hits = docs.len(), "Arxiv lookup");
        Ok(docs)
    }

    fn name(&self) -> &str {
        "Arxiv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:attention</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <updated>2023-08-02T00:41:18Z</updated>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
  You Need</title>
    <summary>  The dominant sequence transduction models are based on complex recurrent
or convolutional neural networks &amp; attention.
</summary>
    <author>
      <name>Ashish Vaswani</name>
    </author>
    <author>
      <name>Noam Shazeer</name>
    </author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed() {
        let docs = parse_feed(FEED).unwrap();
        assert_eq!(docs.len(), 1);
        let paper = &docs[0];
        assert_eq!(paper.title, "Attention Is All You Need");
        assert_eq!(paper.published, NaiveDate::from_ymd_opt(2023, 8, 2));
        assert_eq!(paper.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert!(paper.content.starts_with("The dominant sequence"));
        assert!(paper.content.ends_with("neural networks & attention."));
        assert_eq!(paper.url.as_deref(), Some("http://arxiv.org/abs/1706.03762v7"));
    }

    #[test]
    fn test_error_entry() {
        let feed = r#"<feed><entry><id>http://arxiv.org/api/errors#incorrect_id_format</id>
            <title>Error</title><summary>incorrect id format for 1234</summary></entry></feed>"#;
        let err = parse_feed(feed).unwrap_err();
        assert!(err.to_string().contains("incorrect id format"));
    }

    #[test]
    fn test_identifier_detection() {
        assert!(is_arxiv_identifier("1706.03762"));
        assert!(is_arxiv_identifier("2101.00001v2 1706.03762"));
        assert!(is_arxiv_identifier("hep-th/9901001"));
        assert!(!is_arxiv_identifier("attention is all you need"));
        assert!(!is_arxiv_identifier("1713.03762"));
        assert!(!is_arxiv_identifier("   "));
    }

    #[tokio::test]
    async fn test_lookup_by_id_uses_id_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("id_list", "1706.03762"))
            .and(query_param("max_results", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let client = ArxivClient::new(reqwest::Client::new(), server.uri());
        let docs = client.lookup("1706.03762", 1).await.unwrap();
        assert_eq!(docs[0].title, "Attention Is All You Need");
    }

    #[tokio::test]
    async fn test_lookup_free_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("search_query", "transformer attention"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#,
            ))
            .mount(&server)
            .await;

        let client = ArxivClient::new(reqwest::Client::new(), server.uri());
        assert!(client.lookup("transformer attention", 1).await.unwrap().is_empty());
    }
}
