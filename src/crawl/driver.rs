// src/crawl/driver.rs
// =============================================================================
// The crawl loop.
//
// How it works:
// 1. Seeds go into the frontier
// 2. Pop a URL, fetch it (several fetches may be in flight at once)
// 3. When a page comes back: find the matching rules, enqueue its links,
//    extract a Record for every matching extraction rule
// 4. Repeat until the frontier is empty, max_pages is reached, or someone
//    pulls the StopSignal
//
// The driver moves through three states: Idle -> Running -> Done.
//
// Concurrency model:
//   Fetches run concurrently, but every response is processed by this one
//   loop, which owns the frontier outright. "Is this URL new? Then mark it"
//   is therefore a single step, and no two fetches ever hit the same URL.
//   Records may come out in any order when concurrency > 1.
//
// A failed fetch is logged and skipped; it never stops the crawl.
// =============================================================================

use futures::stream::{FuturesUnordered, StreamExt};
use scraper::Html;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::extract::extract;
use super::fetch::{Fetcher, Page};
use super::frontier::{Frontier, FrontierEntry};
use super::rules::{should_follow, Rule, RuleSet};
use super::sink::Sink;
use crate::config::{CrawlLimits, CrawlPlan};
use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Idle,
    Running,
    Done,
}

/// Why the crawl ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    FrontierExhausted,
    MaxPages,
    Stopped,
}

/// External "please stop" handle.
///
/// Cloning shares the flag. After stop(), the driver finishes the fetches
/// already in flight, then ends.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Counters reported when the crawl is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    /// Pages popped from the frontier (fetched or attempted)
    pub visited: usize,
    /// Pages whose fetch failed
    pub failed: usize,
    /// Records handed to the sink
    pub records: usize,
    /// URLs still queued when the crawl ended
    pub pending: usize,
    pub stop_reason: StopReason,
}

// Everything that lives exactly as long as one crawl. The visited count is
// the frontier's visited set: every pop, fetched or failed.
struct CrawlState {
    frontier: Frontier,
    failed: usize,
    records: usize,
}

/// Runs one crawl described by a CrawlPlan.
pub struct CrawlDriver {
    plan: CrawlPlan,
    stop: StopSignal,
    state: DriverState,
}

impl CrawlDriver {
    pub fn new(plan: CrawlPlan) -> Self {
        Self {
            plan,
            stop: StopSignal::new(),
            state: DriverState::Idle,
        }
    }

    /// Uses an externally owned stop signal (e.g. wired to Ctrl-C).
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Crawls until done and returns the final counters.
    pub async fn run<F, S>(mut self, fetcher: &F, sink: &mut S) -> CrawlSummary
    where
        F: Fetcher + ?Sized,
        S: Sink + ?Sized,
    {
        let mut crawl = CrawlState {
            frontier: Frontier::new(self.plan.allowed_domains.clone(), self.plan.limits.max_depth),
            failed: 0,
            records: 0,
        };
        for seed in &self.plan.start_urls {
            if !crawl.frontier.push(seed.as_str(), 0) {
                debug!(url = %seed, "seed skipped (duplicate or disallowed)");
            }
        }

        self.transition(DriverState::Running);
        let limits = self.plan.limits;
        let rules = &self.plan.rules;
        let mut in_flight = FuturesUnordered::new();

        loop {
            // Admit new fetches while there is room
            while in_flight.len() < limits.concurrency {
                let visited = crawl.frontier.visited_count();
                if self.stop.is_stopped() || page_limit_reached(&limits, visited) {
                    break;
                }
                let Some(entry) = crawl.frontier.pop() else {
                    break;
                };

                info!(depth = entry.depth, url = %entry.url, "crawling");

                in_flight.push(async move {
                    let result = fetcher.fetch(&entry.url).await;
                    (entry, result)
                });
            }

            // Nothing in flight and nothing admitted: we are done
            let Some((entry, result)) = in_flight.next().await else {
                break;
            };
            handle_page(&mut crawl, rules, sink, entry, result);
        }

        let visited = crawl.frontier.visited_count();
        let stop_reason = if self.stop.is_stopped() {
            StopReason::Stopped
        } else if page_limit_reached(&limits, visited) && !crawl.frontier.is_empty() {
            StopReason::MaxPages
        } else {
            StopReason::FrontierExhausted
        };

        self.transition(DriverState::Done);

        let summary = CrawlSummary {
            visited,
            failed: crawl.failed,
            records: crawl.records,
            pending: crawl.frontier.len(),
            stop_reason,
        };
        info!(
            visited = summary.visited,
            failed = summary.failed,
            records = summary.records,
            reason = ?summary.stop_reason,
            "crawl finished"
        );
        summary
    }

    fn transition(&mut self, next: DriverState) {
        debug!(from = ?self.state, to = ?next, "driver state");
        self.state = next;
    }
}

fn page_limit_reached(limits: &CrawlLimits, visited: usize) -> bool {
    limits.max_pages.is_some_and(|max| visited >= max)
}

// Processes one fetched (or failed) page. Kept synchronous: the parsed
// document never lives across an await.
fn handle_page<S: Sink + ?Sized>(
    crawl: &mut CrawlState,
    rules: &RuleSet,
    sink: &mut S,
    entry: FrontierEntry,
    result: Result<Page, FetchError>,
) {
    let page = match result {
        Ok(page) => page,
        Err(e) => {
            warn!(url = %entry.url, error = %e, "fetch failed, skipping page");
            crawl.failed += 1;
            return;
        }
    };

    if page.url != entry.url {
        debug!(url = %entry.url, final_url = %page.url, status = page.status, "redirected");
    }

    // Rules match the queued URL; relative links resolve against the page's
    // final URL
    let document = Html::parse_document(&page.html);
    let matched = rules.matching(&entry.url);

    if should_follow(&matched, entry.depth) {
        let mut added = 0;
        for link in rules.follow_links(&document, &page.url) {
            if crawl.frontier.push(&link, entry.depth + 1) {
                added += 1;
            }
        }
        debug!(url = %entry.url, added, queued = crawl.frontier.len(), "links enqueued");
    }

    for rule in matched {
        if let Rule::Extraction(rule) = rule {
            let record = extract(&document, &entry.url, rule);
            crawl.records += 1;
            sink.emit(record);
        }
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. What is FuturesUnordered?
//    - A set of futures that yields results as they finish
//    - We keep at most `concurrency` fetches in it, so it doubles as our
//      admission control against the target site
//
// 2. Why `let ... else`?
//    - `let Some(x) = expr else { break };` binds x or leaves the loop
//    - Reads top to bottom without an extra level of nesting
//
// 3. Why does stop() not cancel in-flight fetches?
//    - Those pages were already popped and counted as visited
//    - Finishing them means their records still reach the sink
// -----------------------------------------------------------------------------
