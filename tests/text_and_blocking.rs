//! Text cleaning/keyword and blocking-detector boundary tests, per spec §8.

use crawlcore::blocking;
use crawlcore::model::{BlockType, CrawlConfig};
use crawlcore::text;

#[test]
fn blocking_detector_boundaries() {
    // Spec §8 "Boundary behaviours".
    let clean = blocking::detect("<html><body>hello</body></html>", 200, "https://x.test");
    assert!(!clean.blocked);

    let forbidden = blocking::detect("nope", 403, "https://x.test");
    assert_eq!(forbidden.block_type, Some(BlockType::Http403Forbidden));

    let rate_limited = blocking::detect("slow down", 429, "https://x.test");
    assert!(rate_limited.http_block);
    assert!(rate_limited.ip_ban);
}

#[test]
fn crawl_config_rate_limit_and_max_hits_boundaries() {
    // Spec §8 "Boundary behaviours".
    let mut config = CrawlConfig::default();

    config.rate_limit_per_minute = 1;
    assert!(config.validate().is_ok());
    config.rate_limit_per_minute = 300;
    assert!(config.validate().is_ok());
    config.rate_limit_per_minute = 0;
    assert!(config.validate().is_err());
    config.rate_limit_per_minute = 500;
    assert!(config.validate().is_err());

    let mut config = CrawlConfig::default();
    config.max_hits = 1;
    assert!(config.validate().is_ok());
    config.max_hits = 10_000;
    assert!(config.validate().is_ok());
    config.max_hits = 0;
    assert!(config.validate().is_err());
    config.max_hits = 20_000;
    assert!(config.validate().is_err());
}

#[test]
fn cron_validation_rejects_wrong_field_count() {
    // Spec §8 "Round-trip / idempotence".
    let mut config = CrawlConfig::default();
    for bad in ["* * *", "*/5 * * * * *", ""] {
        config.frequency = bad.to_string();
        assert!(config.validate().is_err(), "expected '{bad}' to be rejected");
    }
    config.frequency = "*/5 * * * *".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn extract_keywords_ranks_dominant_term_first() {
    let text = "rust rust rust is a systems programming language used for performance";
    let keywords = text::extract_keywords(text, 5, &[]);
    assert_eq!(keywords[0], "rust");
}

#[test]
fn clean_collapses_punctuation_and_strips_markup() {
    let cleaned = text::clean("<b>Hello</b> world!!! visit https://example.com now.");
    assert!(!cleaned.contains('<'));
    assert!(!cleaned.contains("http"));
    assert!(!cleaned.contains("!!!"));
}
