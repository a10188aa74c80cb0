// src/crawl/mod.rs
// =============================================================================
// This module holds the crawler itself.
//
// Submodules (leaves first):
// - frontier: queue of URLs to visit, dedup + domain allow-list
// - rules:    which rules match a URL, which links to follow
// - extract:  CSS selectors -> Record
// - fetch:    the Fetcher trait and the reqwest-based HttpFetcher
// - sink:     where Records go (JSON Lines, memory)
// - driver:   the crawl loop tying everything together
// =============================================================================

mod driver;
mod extract;
mod fetch;
mod frontier;
mod rules;
mod sink;

pub use driver::{CrawlDriver, CrawlSummary, StopReason, StopSignal};
pub use extract::{extract, FieldSelector, Record, SelectorTarget};
pub use fetch::{Fetcher, HttpFetcher, Page};
pub use frontier::{host_allowed, normalize_url, Frontier, FrontierEntry};
pub use rules::{should_follow, ExtractionRule, Field, NavigationRule, Rule, RuleSet};
pub use sink::{JsonLinesSink, MemorySink, Sink};
