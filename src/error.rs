// src/error.rs
// =============================================================================
// Error types shared by the crawler.
//
// There are two families of failure, and they are handled very differently:
// - ConfigError: the crawl config is broken. Fatal, found once at startup,
//   the crawl never begins.
// - FetchError: one page could not be fetched. Logged and skipped, the rest
//   of the crawl carries on.
//
// A selector that matches nothing is NOT an error at all - that field simply
// ends up empty in the record.
//
// Rust concepts:
// - thiserror: derive macro that writes the Display/Error impls for us
// - #[from]: lets the ? operator convert one error type into another
// =============================================================================

use thiserror::Error;

/// Problems found while loading or validating a crawl config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config declares no start_urls")]
    NoStartUrls,

    #[error("invalid start URL '{url}': {reason}")]
    InvalidStartUrl { url: String, reason: String },

    #[error("start URL '{0}' is outside allowed_domains")]
    SeedOutsideAllowedDomains(String),

    #[error("rule #{index}: invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule #{index}: extraction rule declares no fields")]
    NoFields { index: usize },

    #[error("rule #{index}: field '{field}' is declared more than once")]
    DuplicateField { index: usize, field: String },

    #[error("rule #{index}: field '{field}' has invalid selector '{selector}': {reason}")]
    InvalidSelector {
        index: usize,
        field: String,
        selector: String,
        reason: String,
    },

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Why a single page could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP {0}")]
    Status(u16),

    #[error("not an HTML page (content-type: {0})")]
    NotHtml(String),

    #[error("host is outside allowed_domains: {0}")]
    Disallowed(String),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Request(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages_name_the_rule() {
        let err = ConfigError::DuplicateField {
            index: 1,
            field: "title".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "rule #1: field 'title' is declared more than once"
        );
    }

    #[test]
    fn test_fetch_error_status_message() {
        assert_eq!(FetchError::Status(404).to_string(), "HTTP 404");
    }
}
