//! Domain model: Project, Source, CrawlConfig, Document, CrawlStats and the
//! source status state machine described in spec §3.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

pub type Id = String;

fn new_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Source type, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Website,
    Blog,
    RssFeed,
    Document,
    Api,
    Twitter,
    Reddit,
    Youtube,
    Linkedin,
}

/// Content type, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Html,
    Rss,
    Pdf,
    Txt,
    Twitter,
    Reddit,
    Youtube,
    Linkedin,
}

/// Source status state machine, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Paused,
    Blocked,
}

impl SourceStatus {
    /// Whether `self -> next` is a legal transition per spec §3.
    pub fn can_transition_to(self, next: SourceStatus) -> bool {
        use SourceStatus::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Blocked)
                | (Idle, Paused)
                | (Completed, Paused)
                | (Failed, Paused)
                | (Paused, Idle)
                | (Blocked, Idle)
        )
    }
}

/// Adversarial-response classification, per spec §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockType {
    Http403Forbidden,
    Http429RateLimit,
    Http503ServiceUnavailable,
    Captcha,
    IpBan,
}

/// Retry policy embedded in `CrawlConfig`, per spec §3/§4.1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, backoff_factor: 2.0, timeout_secs: 30 }
    }
}

impl RetryPolicy {
    /// `backoff_factor · 2^(attempt−1)` seconds, per spec §4.1.
    pub fn backoff_delay(&self, attempt: u32) -> std::time::Duration {
        let secs = self.backoff_factor * 2f64.powi(attempt as i32 - 1);
        std::time::Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Crawl configuration embedded in a Source, per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub frequency: String,
    pub max_hits: u32,
    pub enabled: bool,
    pub follow_links: bool,
    pub max_depth: u32,
    pub rate_limit_per_minute: u32,
    pub retry_policy: RetryPolicy,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            frequency: "0 0 * * *".to_string(),
            max_hits: 100,
            enabled: true,
            follow_links: false,
            max_depth: 1,
            rate_limit_per_minute: 30,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl CrawlConfig {
    /// Validates the bounds named in spec §3 and §8. A cron expression is
    /// valid iff whitespace-split yields exactly 5 fields.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.frequency.split_whitespace().count() != 5 {
            return Err(CoreError::invalid_config(format!(
                "cron expression must have 5 fields: minute hour day month weekday, got '{}'",
                self.frequency
            )));
        }
        if !(1..=10_000).contains(&self.max_hits) {
            return Err(CoreError::invalid_config(format!(
                "max_hits must be in [1, 10000], got {}",
                self.max_hits
            )));
        }
        if !(1..=5).contains(&self.max_depth) {
            return Err(CoreError::invalid_config(format!(
                "max_depth must be in [1, 5], got {}",
                self.max_depth
            )));
        }
        if !(1..=300).contains(&self.rate_limit_per_minute) {
            return Err(CoreError::invalid_config(format!(
                "rate_limit_per_minute must be in [1, 300], got {}",
                self.rate_limit_per_minute
            )));
        }
        Ok(())
    }

    /// Intra-run pacing delay, per spec §4.5 step 3.
    pub fn intra_run_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(60.0 / self.rate_limit_per_minute as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Id,
    pub name: String,
    pub domain: String,
    pub keywords: Vec<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            domain: domain.into(),
            keywords: Vec::new(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Id,
    pub name: String,
    pub url: String,
    pub project_id: Option<Id>,
    pub source_type: SourceType,
    pub content_type: ContentType,
    pub config: CrawlConfig,
    pub status: SourceStatus,
    pub last_crawl: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub total_documents: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        source_type: SourceType,
        content_type: ContentType,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        if name.is_empty() || name.chars().count() > 200 {
            return Err(CoreError::invalid_config(
                "source name must be non-empty and at most 200 characters",
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: new_id(),
            name,
            url: url.into(),
            project_id: None,
            source_type,
            content_type,
            config: CrawlConfig::default(),
            status: SourceStatus::Idle,
            last_crawl: None,
            last_error: None,
            total_documents: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Attempts `self.status -> next`, returning an error if the transition
    /// is not legal per the state machine of spec §3.
    pub fn transition(&mut self, next: SourceStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::invalid_config(format!(
                "illegal status transition {:?} -> {:?}",
                self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub word_count: usize,
    pub keywords: Vec<String>,
    pub custom: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Id,
    pub url: String,
    pub source_id: Id,
    pub content_type: ContentType,
    pub raw_content: String,
    pub cleaned_text: String,
    pub metadata: DocumentMetadata,
    pub crawl_config_snapshot: CrawlConfig,
    pub crawled_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        url: impl Into<String>,
        source_id: Id,
        content_type: ContentType,
        raw_content: String,
        cleaned_text: String,
        metadata: DocumentMetadata,
        crawl_config_snapshot: CrawlConfig,
    ) -> Self {
        Self {
            id: new_id(),
            url: url.into(),
            source_id,
            content_type,
            raw_content,
            cleaned_text,
            metadata,
            crawl_config_snapshot,
            crawled_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlStats {
    pub id: Id,
    pub source_id: Id,
    pub pages_crawled: u32,
    pub pages_failed: u32,
    pub bytes_downloaded: u64,
    pub duration_seconds: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub errors: Vec<String>,
}

impl CrawlStats {
    pub fn started(source_id: Id) -> Self {
        Self {
            id: new_id(),
            source_id,
            pages_crawled: 0,
            pages_failed: 0,
            bytes_downloaded: 0,
            duration_seconds: 0.0,
            started_at: Utc::now(),
            completed_at: None,
            errors: Vec::new(),
        }
    }
}

/// A search request against the Store, per spec §4.7/§6.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub keywords: String,
    pub source_id: Option<Id>,
    pub content_type: Option<ContentType>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub boolean_or: bool,
    pub limit: usize,
    pub offset: usize,
}

impl SearchQuery {
    pub fn new(keywords: impl Into<String>) -> Self {
        Self { keywords: keywords.into(), limit: 10, ..Default::default() }
    }
}

/// One ranked hit, per spec §4.7's "Search" bullet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub document_id: Id,
    pub url: String,
    pub source_id: Id,
    pub title: Option<String>,
    pub score: f32,
    pub snippet: String,
}

/// Cross-entity counters, per spec §4.7's "Aggregates" bullet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_sources: usize,
    pub total_documents: usize,
    pub documents_by_content_type: HashMap<ContentType, usize>,
    pub top_sources_by_document_count: Vec<(Id, u64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawl_config_rejects_bad_cron() {
        let mut cfg = CrawlConfig::default();
        cfg.frequency = "*/5 * *".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn crawl_config_boundaries() {
        let mut cfg = CrawlConfig::default();
        cfg.max_hits = 1;
        assert!(cfg.validate().is_ok());
        cfg.max_hits = 10_000;
        assert!(cfg.validate().is_ok());
        cfg.max_hits = 0;
        assert!(cfg.validate().is_err());
        cfg.max_hits = 20_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rate_limit_boundaries() {
        let mut cfg = CrawlConfig::default();
        cfg.rate_limit_per_minute = 1;
        assert!(cfg.validate().is_ok());
        cfg.rate_limit_per_minute = 300;
        assert!(cfg.validate().is_ok());
        cfg.rate_limit_per_minute = 0;
        assert!(cfg.validate().is_err());
        cfg.rate_limit_per_minute = 500;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn status_transitions() {
        assert!(SourceStatus::Idle.can_transition_to(SourceStatus::Running));
        assert!(SourceStatus::Running.can_transition_to(SourceStatus::Blocked));
        assert!(SourceStatus::Blocked.can_transition_to(SourceStatus::Idle));
        assert!(!SourceStatus::Blocked.can_transition_to(SourceStatus::Completed));
        assert!(!SourceStatus::Idle.can_transition_to(SourceStatus::Completed));
    }

    #[test]
    fn retry_backoff_is_exponential() {
        let policy = RetryPolicy { max_retries: 3, backoff_factor: 2.0, timeout_secs: 30 };
        assert_eq!(policy.backoff_delay(1).as_secs_f64(), 2.0);
        assert_eq!(policy.backoff_delay(2).as_secs_f64(), 4.0);
        assert_eq!(policy.backoff_delay(3).as_secs_f64(), 8.0);
    }
}
