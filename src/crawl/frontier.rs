// src/crawl/frontier.rs
// =============================================================================
// The frontier: the queue of pages we still have to visit.
//
// How it works:
// 1. push() normalizes a URL and checks it against the allow-list
// 2. URLs already queued or already visited are ignored
// 3. pop() hands out the oldest URL first (breadth-first order) and
//    remembers it as visited, so it can never come back
//
// Every URL lives in at most one of two sets:
//   queued  - waiting in the VecDeque
//   visited - already handed out by pop()
//
// Rust concepts:
// - VecDeque: push_back()/pop_front() gives us a FIFO queue
// - HashSet: O(1) "have we seen this?" checks
// =============================================================================

use std::collections::{HashSet, VecDeque};
use url::Url;

/// A page waiting in the frontier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Normalized absolute URL
    pub url: String,
    /// Link hops from the nearest seed (seeds are depth 0)
    pub depth: usize,
}

/// FIFO queue of URLs with allow-list and at-most-once-visit guarantees.
#[derive(Debug)]
pub struct Frontier {
    allowed_domains: Vec<String>,
    max_depth: Option<usize>,
    queue: VecDeque<FrontierEntry>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new(allowed_domains: Vec<String>, max_depth: Option<usize>) -> Self {
        Self {
            allowed_domains,
            max_depth,
            queue: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
        }
    }

    /// Adds a URL to the back of the queue.
    ///
    /// Returns false (and changes nothing) when the URL is unparseable,
    /// off the allow-list, too deep, or already queued/visited.
    pub fn push(&mut self, url: &str, depth: usize) -> bool {
        if self.max_depth.is_some_and(|max| depth > max) {
            return false;
        }

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };
        let allowed = parsed
            .host_str()
            .is_some_and(|host| host_allowed(host, &self.allowed_domains));
        if !allowed {
            return false;
        }

        let normalized = match normalize(parsed) {
            Some(normalized) => normalized,
            None => return false,
        };

        if self.visited.contains(&normalized) || self.queued.contains(&normalized) {
            return false;
        }

        self.queued.insert(normalized.clone());
        self.queue.push_back(FrontierEntry {
            url: normalized,
            depth,
        });
        true
    }

    /// Removes the oldest entry and marks it visited.
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        let entry = self.queue.pop_front()?;
        self.queued.remove(&entry.url);
        self.visited.insert(entry.url.clone());
        Some(entry)
    }

    /// Number of URLs waiting to be visited.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

/// Checks a host against the allow-list.
///
/// A domain allows itself and every subdomain:
///   "rei.com" allows "rei.com" and "www.rei.com", but not "notrei.com".
pub fn host_allowed(host: &str, allowed_domains: &[String]) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    allowed_domains.iter().any(|domain| {
        host == *domain
            || (host.len() > domain.len()
                && host.ends_with(domain.as_str())
                && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
    })
}

/// Normalizes a URL for deduplication.
///
/// Keeps scheme, host, port and path, sorts the query pairs and drops the
/// fragment, so these all become the same URL:
///   http://X.com/list?b=2&a=1#top
///   http://x.com/list?a=1&b=2
///
/// Returns None for anything that is not an http(s) URL with a host.
pub fn normalize_url(url: &str) -> Option<String> {
    Url::parse(url).ok().and_then(normalize)
}

fn normalize(mut url: Url) -> Option<String> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.host_str()?;

    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    Some(url.to_string())
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why normalize before deduplicating?
//    - Links to the same page are often written differently
//    - "?page=2&sort=asc" and "?sort=asc&page=2" are the same listing
//    - Url::parse already lowercases the host and removes default ports
//
// 2. Why does pop() move the URL into `visited` instead of fetch success?
//    - A page that fails to fetch must not be retried forever
//    - "Visited" means "attempted", whatever the outcome
//
// 3. What is is_some_and()?
//    - Option::is_some_and(f) is true when the Option is Some and f(value)
//      returns true
//    - A compact version of `matches!(opt, Some(x) if f(x))`
// -----------------------------------------------------------------------------
