use std::time::Duration;

use async_trait::async_trait;
use html2text::render::text_renderer::TrivialDecorator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use prattle_config::schema::SearchConfig;
use prattle_core::{PrattleError, Result};

pub const DUCKDUCKGO: &str = "duckduckgo";
pub const WIKIPEDIA: &str = "wikipedia";

/// A short piece of text returned by one search source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// Lowercase source name, e.g. `wikipedia`.
    pub source: String,
    pub text: String,
}

impl Snippet {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Web search as seen by the responder.
///
/// Implementations query their sources concurrently and merge whatever
/// succeeded. Failures are logged and dropped, so the worst case is an
/// empty list.
#[async_trait]
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &str;

    async fn search_web(&self, query: &str) -> Vec<Snippet>;
}

/// Search disabled: always empty.
pub struct NoopSearch;

#[async_trait]
impl WebSearch for NoopSearch {
    fn name(&self) -> &str {
        "noop"
    }

    async fn search_web(&self, _query: &str) -> Vec<Snippet> {
        Vec::new()
    }
}

/// DuckDuckGo Instant Answer + MediaWiki search over HTTP.
pub struct HttpSearchService {
    client: reqwest::Client,
    duckduckgo_url: String,
    wikipedia_url: String,
    timeout: Duration,
}

impl HttpSearchService {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("prattle/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PrattleError::Search {
                source_name: "client".into(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            duckduckgo_url: config.duckduckgo_url.clone(),
            wikipedia_url: config.wikipedia_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        })
    }

    async fn fetch_json(&self, source: &str, request: reqwest::RequestBuilder) -> Result<Value> {
        let search_err = |reason: String| PrattleError::Search {
            source_name: source.to_string(),
            reason,
        };

        let send = async {
            let resp = request.send().await.map_err(|e| search_err(e.to_string()))?;
            if !resp.status().is_success() {
                return Err(search_err(format!("HTTP {}", resp.status())));
            }
            resp.json::<Value>().await.map_err(|e| search_err(e.to_string()))
        };

        tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| PrattleError::SearchTimeout {
                timeout_secs: self.timeout.as_secs(),
            })?
    }

    async fn query_duckduckgo(&self, query: &str) -> Result<Vec<Snippet>> {
        let request = self
            .client
            .get(&self.duckduckgo_url)
            .query(&[("q", query), ("format", "json"), ("no_html", "1")]);
        let body = self.fetch_json(DUCKDUCKGO, request).await?;
        Ok(extract_duckduckgo(&body)
            .into_iter()
            .map(|text| Snippet::new(DUCKDUCKGO, text))
            .collect())
    }

    async fn query_wikipedia(&self, query: &str) -> Result<Vec<Snippet>> {
        let request = self.client.get(&self.wikipedia_url).query(&[
            ("action", "query"),
            ("list", "search"),
            ("srsearch", query),
            ("format", "json"),
            ("utf8", ""),
        ]);
        let body = self.fetch_json(WIKIPEDIA, request).await?;
        Ok(extract_wikipedia(&body)
            .into_iter()
            .map(|text| Snippet::new(WIKIPEDIA, text))
            .collect())
    }
}

#[async_trait]
impl WebSearch for HttpSearchService {
    fn name(&self) -> &str {
        "http"
    }

    async fn search_web(&self, query: &str) -> Vec<Snippet> {
        let (ddg, wiki) = futures::join!(self.query_duckduckgo(query), self.query_wikipedia(query));

        let mut snippets = Vec::new();
        for (source, outcome) in [(DUCKDUCKGO, ddg), (WIKIPEDIA, wiki)] {
            match outcome {
                Ok(found) => {
                    debug!(source, count = found.len(), "search source answered");
                    snippets.extend(found);
                }
                Err(e) => warn!(source, error = %e, "search source failed"),
            }
        }
        snippets
    }
}

/// Texts from a DuckDuckGo Instant Answer body: the abstract if present,
/// otherwise the result texts.
pub fn extract_duckduckgo(body: &Value) -> Vec<String> {
    if let Some(text) = body["AbstractText"].as_str().map(str::trim)
        && !text.is_empty()
    {
        return vec![text.to_string()];
    }

    body["Results"]
        .as_array()
        .map(|results| {
            results
                .iter()
                .filter_map(|r| r["Text"].as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Snippets from a MediaWiki `list=search` body, with markup removed.
pub fn extract_wikipedia(body: &Value) -> Vec<String> {
    body["query"]["search"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .filter_map(|h| h["snippet"].as_str())
                .map(strip_html)
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Width handed to the renderer; snippets are flattened to one line anyway.
const RENDER_WIDTH: usize = 1000;

/// Render snippet markup to plain text on a single line.
pub fn strip_html(raw: &str) -> String {
    let text = html2text::from_read_with_decorator(
        raw.as_bytes(),
        RENDER_WIDTH,
        TrivialDecorator::new(),
    );
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
