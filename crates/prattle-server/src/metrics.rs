//! Prometheus-compatible counters for the Prattle server.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;

use prattle_runtime::Stage;

#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    http_requests_total: AtomicU64,
    http_errors_total: AtomicU64,
    chat_messages_total: AtomicU64,
    resets_total: AtomicU64,
    /// Replies keyed by the cascade stage that produced them.
    replies_by_stage: DashMap<Stage, u64>,
    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                http_requests_total: AtomicU64::new(0),
                http_errors_total: AtomicU64::new(0),
                chat_messages_total: AtomicU64::new(0),
                resets_total: AtomicU64::new(0),
                replies_by_stage: DashMap::new(),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn inc_http_requests(&self) {
        self.inner.http_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_http_errors(&self) {
        self.inner.http_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_resets(&self) {
        self.inner.resets_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one answered chat message.
    pub fn record_reply(&self, stage: Stage) {
        self.inner.chat_messages_total.fetch_add(1, Ordering::Relaxed);
        *self.inner.replies_by_stage.entry(stage).or_insert(0) += 1;
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    /// Render metrics in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let m = &self.inner;
        let mut out = format!(
            r#"# HELP prattle_uptime_seconds Time since the server started.
# TYPE prattle_uptime_seconds gauge
prattle_uptime_seconds {}

# HELP prattle_http_requests_total Total HTTP requests served.
# TYPE prattle_http_requests_total counter
prattle_http_requests_total {}

# HELP prattle_http_errors_total Total HTTP errors (4xx/5xx).
# TYPE prattle_http_errors_total counter
prattle_http_errors_total {}

# HELP prattle_chat_messages_total Total chat messages answered.
# TYPE prattle_chat_messages_total counter
prattle_chat_messages_total {}

# HELP prattle_resets_total Total channel resets.
# TYPE prattle_resets_total counter
prattle_resets_total {}

# HELP prattle_replies_total Replies by answering cascade stage.
# TYPE prattle_replies_total counter
"#,
            self.uptime_secs(),
            m.http_requests_total.load(Ordering::Relaxed),
            m.http_errors_total.load(Ordering::Relaxed),
            m.chat_messages_total.load(Ordering::Relaxed),
            m.resets_total.load(Ordering::Relaxed),
        );

        let stages = Stage::GUARDS.iter().chain(Stage::CASCADE.iter());
        for stage in stages {
            let count = m.replies_by_stage.get(stage).map(|c| *c).unwrap_or(0);
            out.push_str(&format!("prattle_replies_total{{stage=\"{stage}\"}} {count}\n"));
        }
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
