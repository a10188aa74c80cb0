// src/lib.rs
// =============================================================================
// Library root for rule-crawler.
//
// The binary (src/main.rs) is a thin CLI on top of these modules:
// - config: the JSON crawl config and its validation
// - crawl:  frontier, rules, extraction, fetching, sinks and the driver
// - error:  ConfigError and FetchError
// =============================================================================

pub mod config;
pub mod crawl;
pub mod error;

pub use config::{CrawlConfig, CrawlPlan};
pub use crawl::{CrawlDriver, CrawlSummary, HttpFetcher, JsonLinesSink, Record, StopSignal};
pub use error::{ConfigError, FetchError};
