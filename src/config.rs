//! Configuration surface, per spec §6: the options the external supervisor
//! recognises and loads before constructing this crate's components.
//!
//! Loaded from environment variables with sane defaults layered
//! on top of a `Default` impl — rather than a TOML file, since spec §6 only
//! names environment-style options and this crate carries no file format
//! of its own.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub mongodb_uri: Option<String>,
    pub mongodb_db: Option<String>,
    pub crawler_user_agent: String,
    pub crawler_delay: f64,
    pub max_workers: usize,
    pub request_timeout: u64,
    pub max_retries: u32,
    pub log_level: String,
    pub log_file: Option<String>,
    pub api_host: String,
    pub api_port: u16,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            mongodb_uri: None,
            mongodb_db: None,
            crawler_user_agent: "crawlcore/0.1".to_string(),
            crawler_delay: 1.0,
            max_workers: 10,
            request_timeout: 30,
            max_retries: 3,
            log_level: "info".to_string(),
            log_file: None,
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
        }
    }
}

impl CoreConfig {
    /// Loads defaults, then overrides them from environment variables named
    /// after the recognised options of spec §6 (upper-snake-case).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("MONGODB_URI") {
            config.mongodb_uri = Some(v);
        }
        if let Ok(v) = std::env::var("MONGODB_DB") {
            config.mongodb_db = Some(v);
        }
        if let Ok(v) = std::env::var("CRAWLER_USER_AGENT") {
            config.crawler_user_agent = v;
        }
        if let Ok(v) = std::env::var("CRAWLER_DELAY").and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent)) {
            config.crawler_delay = v;
        }
        if let Ok(v) = std::env::var("MAX_WORKERS").and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent)) {
            config.max_workers = v;
        }
        if let Ok(v) = std::env::var("REQUEST_TIMEOUT").and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent)) {
            config.request_timeout = v;
        }
        if let Ok(v) = std::env::var("MAX_RETRIES").and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent)) {
            config.max_retries = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("LOG_FILE") {
            config.log_file = Some(v);
        }
        if let Ok(v) = std::env::var("API_HOST") {
            config.api_host = v;
        }
        if let Ok(v) = std::env::var("API_PORT").and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent)) {
            config.api_port = v;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = CoreConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.api_port, 8000);
        assert!(config.mongodb_uri.is_none());
    }
}
