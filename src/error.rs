//! Crate-wide error taxonomy.
//!
//! Mirrors the kinds a caller needs to branch on (robots gating, network
//! exhaustion, blocking, parse failure, storage duplicates/failures,
//! invalid config, not-found) as explicit variants rather than strings, in
//! the shape of `common::results::task_error::TaskError` from the crawler
//! this crate grew out of.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::BlockType;

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum CoreError {
    #[error("robots.txt disallows crawling: {url}")]
    RobotsDisallowed { url: String },

    #[error("network failure after {attempts} attempt(s): {message}")]
    NetworkFailure { message: String, attempts: u32 },

    #[error("blocked ({block_type:?}): {reason}")]
    Blocked { block_type: BlockType, reason: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("duplicate document for url {url}")]
    DuplicateDocument { url: String },

    #[error("duplicate source for url {url}")]
    DuplicateSource { url: String },

    #[error("storage error: {message}")]
    StorageError { message: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CoreError {
    pub fn robots_disallowed(url: impl Into<String>) -> Self {
        Self::RobotsDisallowed { url: url.into() }
    }

    pub fn network_failure(message: impl Into<String>, attempts: u32) -> Self {
        Self::NetworkFailure { message: message.into(), attempts }
    }

    pub fn blocked(block_type: BlockType, reason: impl Into<String>) -> Self {
        Self::Blocked { block_type, reason: reason.into() }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError { message: message.into() }
    }

    pub fn storage_error(message: impl Into<String>) -> Self {
        Self::StorageError { message: message.into() }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    pub fn duplicate_source(url: impl Into<String>) -> Self {
        Self::DuplicateSource { url: url.into() }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Whether the crawl manager should retry the operation that raised this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure { .. })
    }

    /// Wire-visible HTTP status for the (external, out-of-scope) REST facade.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidConfig { .. } => 422,
            Self::DuplicateDocument { .. } => 400,
            Self::DuplicateSource { .. } => 400,
            _ => 500,
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkFailure { message: err.to_string(), attempts: 1 }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_failure_is_retryable() {
        let err = CoreError::network_failure("timed out", 2);
        assert!(err.is_retryable());
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(CoreError::not_found("source").http_status(), 404);
    }

    #[test]
    fn invalid_config_maps_to_422() {
        assert_eq!(CoreError::invalid_config("bad cron").http_status(), 422);
    }
}
