// src/config.rs
// =============================================================================
// The crawl configuration: which sites, where to start, which rules.
//
// A config is a small JSON file:
//
//   {
//     "allowed_domains": ["rei.com"],
//     "start_urls": ["https://www.rei.com/c/camping-and-hiking/f/scd-deals"],
//     "rules": [
//       { "kind": "navigation", "pattern": "page=" },
//       { "kind": "extraction", "pattern": "product=",
//         "fields": [{ "name": "title", "selector": "h1#product-page-title::text" }] }
//     ],
//     "max_pages": 500
//   }
//
// Loading happens in two steps:
// 1. load()/from_json(): JSON text -> CrawlConfig (plain data, serde)
// 2. compile(): CrawlConfig -> CrawlPlan (regexes and selectors compiled,
//    every ConfigError found here, before any request is sent)
// =============================================================================

use crate::crawl::{host_allowed, RuleSet};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

fn default_concurrency() -> usize {
    4
}

fn default_request_delay_ms() -> u64 {
    100
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("rule-crawler/{}", env!("CARGO_PKG_VERSION"))
}

/// The crawl config exactly as written in the JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlConfig {
    /// Hosts the crawler may visit. Empty means "the hosts of start_urls".
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    pub start_urls: Vec<String>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub max_pages: Option<usize>,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// One rule as declared in the config.
///
/// The "kind" key picks the variant:
///   { "kind": "navigation", "pattern": "page=" }
///   { "kind": "extraction", "pattern": "product=", "fields": [...] }
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleConfig {
    Navigation {
        pattern: String,
    },
    Extraction {
        pattern: String,
        fields: Vec<FieldConfig>,
        /// Also follow the links found on extracted pages.
        #[serde(default)]
        follow: bool,
    },
}

/// A named field and the selector that fills it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    pub name: String,
    pub selector: String,
}

/// Bounds on how much the driver does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlLimits {
    pub max_pages: Option<usize>,
    pub max_depth: Option<usize>,
    pub concurrency: usize,
}

/// Settings handed to the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub request_delay: Duration,
    pub user_agent: String,
}

/// A validated, ready-to-run crawl.
#[derive(Debug, Clone)]
pub struct CrawlPlan {
    pub allowed_domains: Vec<String>,
    pub start_urls: Vec<Url>,
    pub rules: RuleSet,
    pub limits: CrawlLimits,
    pub fetch: FetchSettings,
}

impl CrawlConfig {
    /// Reads and parses a config file. Does not validate it yet.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Validates everything and compiles patterns and selectors.
    pub fn compile(&self) -> Result<CrawlPlan, ConfigError> {
        if self.start_urls.is_empty() {
            return Err(ConfigError::NoStartUrls);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        let mut start_urls = Vec::with_capacity(self.start_urls.len());
        for raw in &self.start_urls {
            start_urls.push(parse_seed(raw)?);
        }

        let mut allowed_domains: Vec<String> = self
            .allowed_domains
            .iter()
            .map(|d| d.trim().trim_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        // No explicit allow-list: stay on the sites we were seeded with
        if allowed_domains.is_empty() {
            for seed in &start_urls {
                if let Some(host) = seed.host_str() {
                    let host = host.to_ascii_lowercase();
                    if !allowed_domains.contains(&host) {
                        allowed_domains.push(host);
                    }
                }
            }
        }

        for seed in &start_urls {
            let host = seed.host_str().unwrap_or_default();
            if !host_allowed(host, &allowed_domains) {
                return Err(ConfigError::SeedOutsideAllowedDomains(seed.to_string()));
            }
        }

        let rules = RuleSet::compile(&self.rules)?;

        Ok(CrawlPlan {
            allowed_domains,
            start_urls,
            rules,
            limits: CrawlLimits {
                max_pages: self.max_pages,
                max_depth: self.max_depth,
                concurrency: self.concurrency,
            },
            fetch: FetchSettings {
                timeout: Duration::from_secs(self.timeout_secs),
                request_delay: Duration::from_millis(self.request_delay_ms),
                user_agent: self.user_agent.clone(),
            },
        })
    }
}

fn parse_seed(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidStartUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidStartUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidStartUrl {
            url: raw.to_string(),
            reason: "URL has no host".to_string(),
        });
    }

    Ok(url)
}
