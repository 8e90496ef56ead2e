//! Structured logging setup and crawl event logging, in the shape of the
//! teacher crate's `utils::logging`/`logging::events` modules.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::CoreConfig;

/// Initializes global structured logging from `config.log_level`/`log_file`.
pub fn init_logging(config: &CoreConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},crawlcore={}", config.log_level, config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if let Some(path) = &config.log_file {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(file).with_ansi(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    Ok(())
}

/// Per-run event logger, emitted at the seams the crawl manager, fetcher,
/// blocking detector and scheduler act at.
pub struct CrawlEventLogger {
    source_id: String,
}

impl CrawlEventLogger {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self { source_id: source_id.into() }
    }

    pub fn log_fetch_attempt(&self, url: &str, attempt: u32) {
        tracing::debug!(source_id = %self.source_id, url, attempt, event = "fetch_attempt", "fetching URL");
    }

    pub fn log_fetch_success(&self, url: &str, status: u16, bytes: usize) {
        tracing::info!(source_id = %self.source_id, url, status, bytes, event = "fetch_success", "fetch succeeded");
    }

    pub fn log_fetch_failure(&self, url: &str, error: &str, will_retry: bool) {
        if will_retry {
            tracing::warn!(source_id = %self.source_id, url, error, event = "fetch_retry", "fetch failed, will retry");
        } else {
            tracing::error!(source_id = %self.source_id, url, error, event = "fetch_failed", "fetch failed permanently");
        }
    }

    pub fn log_robots_disallowed(&self, url: &str) {
        tracing::warn!(source_id = %self.source_id, url, event = "robots_disallowed", "URL disallowed by robots.txt");
    }

    pub fn log_blocked(&self, url: &str, block_type: &str, reason: &str) {
        tracing::error!(source_id = %self.source_id, url, block_type, reason, event = "blocked", "run aborted: blocking detected");
    }

    pub fn log_parse_error(&self, url: &str, error: &str) {
        tracing::warn!(source_id = %self.source_id, url, error, event = "parse_error", "parse failed");
    }

    pub fn log_document_stored(&self, url: &str) {
        tracing::debug!(source_id = %self.source_id, url, event = "document_stored", "document stored");
    }

    pub fn log_document_duplicate(&self, url: &str) {
        tracing::debug!(source_id = %self.source_id, url, event = "document_duplicate", "document already present");
    }

    pub fn log_run_completed(&self, pages_crawled: u32, pages_failed: u32, duration_ms: u64) {
        tracing::info!(
            source_id = %self.source_id,
            pages_crawled,
            pages_failed,
            duration_ms,
            event = "run_completed",
            "crawl run completed"
        );
    }
}
