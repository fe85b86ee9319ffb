//! Deterministic stand-ins for tests.
//!
//! Nothing here touches the network.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::search::{Snippet, WebSearch};
use crate::sentiment::{SentimentReport, SentimentService};

/// A search service that replays queued result sets.
///
/// # Example
/// ```
/// use prattle_services::mock::MockSearch;
/// let search = MockSearch::new()
///     .with_snippet("wikipedia", "Rust is a programming language.");
/// ```
#[derive(Default)]
pub struct MockSearch {
    results: Mutex<VecDeque<Vec<Snippet>>>,
    /// Every query received, in order.
    pub queries: Arc<Mutex<Vec<String>>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one result set.
    pub fn with_results(self, snippets: Vec<Snippet>) -> Self {
        self.results.lock().push_back(snippets);
        self
    }

    /// Queue a result set holding a single snippet.
    pub fn with_snippet(self, source: &str, text: &str) -> Self {
        self.with_results(vec![Snippet::new(source, text)])
    }

    /// Queue an empty result set, as when every source fails.
    pub fn with_failure(self) -> Self {
        self.with_results(Vec::new())
    }

    pub fn recorded_queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl WebSearch for MockSearch {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search_web(&self, query: &str) -> Vec<Snippet> {
        self.queries.lock().push(query.to_string());
        self.results.lock().pop_front().unwrap_or_default()
    }
}

/// A sentiment service that always returns the same report.
pub struct FixedSentiment {
    report: SentimentReport,
}

impl FixedSentiment {
    pub fn new(report: SentimentReport) -> Self {
        Self { report }
    }
}

impl SentimentService for FixedSentiment {
    fn analyze(&self, _text: &str) -> SentimentReport {
        self.report.clone()
    }
}
