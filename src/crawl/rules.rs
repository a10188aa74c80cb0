// src/crawl/rules.rs
// =============================================================================
// Rules decide what the crawler does with a URL.
//
// There are two kinds:
// - Navigation rules: "pages like this lead somewhere" (pagination, category
//   listings). Their links are followed; nothing is extracted.
// - Extraction rules: "pages like this are products". Fields are extracted
//   into a Record.
//
// Rules are checked independently, never exclusively: a listing page can be
// a navigation page AND an extraction page at the same time, and then both
// things happen.
//
// Which links get enqueued?
//   A page is "followed" when it is a seed, matches a navigation rule, or
//   matches an extraction rule declared with follow = true. Every link on a
//   followed page whose target matches ANY rule pattern is enqueued. That is
//   how product pages get visited from a listing, and how we avoid wandering
//   off into every footer link of the site.
// =============================================================================

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

use super::extract::FieldSelector;
use super::frontier::normalize_url;
use crate::config::RuleConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct NavigationRule {
    /// Position in the config's rule list
    pub index: usize,
    pub pattern: Regex,
}

#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub index: usize,
    pub pattern: Regex,
    pub fields: Vec<Field>,
    pub follow: bool,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub selector: FieldSelector,
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub enum Rule {
    Navigation(NavigationRule),
    Extraction(ExtractionRule),
}

impl Rule {
    pub fn pattern(&self) -> &Regex {
        match self {
            Rule::Navigation(rule) => &rule.pattern,
            Rule::Extraction(rule) => &rule.pattern,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Rule::Navigation(rule) => rule.index,
            Rule::Extraction(rule) => rule.index,
        }
    }

    pub fn is_match(&self, url: &str) -> bool {
        self.pattern().is_match(url)
    }

    /// Whether links on a page matched by this rule should be followed.
    pub fn follows_links(&self) -> bool {
        match self {
            Rule::Navigation(_) => true,
            Rule::Extraction(rule) => rule.follow,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Rule::Navigation(_) => "navigation",
            Rule::Extraction(_) => "extraction",
        }
    }
}

/// The ordered list of compiled rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compiles rule configs, rejecting bad patterns, selectors and fields.
    pub fn compile(configs: &[RuleConfig]) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(configs.len());

        for (index, config) in configs.iter().enumerate() {
            let rule = match config {
                RuleConfig::Navigation { pattern } => Rule::Navigation(NavigationRule {
                    index,
                    pattern: compile_pattern(index, pattern)?,
                }),
                RuleConfig::Extraction {
                    pattern,
                    fields,
                    follow,
                } => {
                    if fields.is_empty() {
                        return Err(ConfigError::NoFields { index });
                    }

                    let mut seen = HashSet::new();
                    let mut compiled = Vec::with_capacity(fields.len());
                    for field in fields {
                        if !seen.insert(field.name.as_str()) {
                            return Err(ConfigError::DuplicateField {
                                index,
                                field: field.name.clone(),
                            });
                        }
                        let selector = FieldSelector::parse(&field.selector).map_err(|reason| {
                            ConfigError::InvalidSelector {
                                index,
                                field: field.name.clone(),
                                selector: field.selector.clone(),
                                reason,
                            }
                        })?;
                        compiled.push(Field {
                            name: field.name.clone(),
                            selector,
                        });
                    }

                    Rule::Extraction(ExtractionRule {
                        index,
                        pattern: compile_pattern(index, pattern)?,
                        fields: compiled,
                        follow: *follow,
                    })
                }
            };
            rules.push(rule);
        }

        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Every rule whose pattern matches the URL, in declaration order.
    pub fn matching(&self, url: &str) -> Vec<&Rule> {
        self.rules.iter().filter(|rule| rule.is_match(url)).collect()
    }

    /// True when some rule wants this URL crawled.
    pub fn is_link_target(&self, url: &str) -> bool {
        self.rules.iter().any(|rule| rule.is_match(url))
    }

    /// Links on `document` worth enqueueing: normalized, http(s), matching a
    /// rule, each listed once, in page order.
    ///
    /// Patterns are tested against the normalized form, the same string
    /// `matching` sees once the page comes out of the frontier.
    pub fn follow_links(&self, document: &Html, page_url: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        extract_links(document, page_url)
            .iter()
            .filter_map(|link| normalize_url(link))
            .filter(|link| self.is_link_target(link))
            .filter(|link| seen.insert(link.clone()))
            .collect()
    }
}

/// Whether the links of a page should be considered at all.
///
/// Seeds are always followed, like the start page of any crawl.
pub fn should_follow(matched: &[&Rule], depth: usize) -> bool {
    depth == 0 || matched.iter().any(|rule| rule.follows_links())
}

fn compile_pattern(index: usize, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        index,
        pattern: pattern.to_string(),
        source,
    })
}

fn anchor_selector() -> &'static Selector {
    static ANCHORS: OnceLock<Selector> = OnceLock::new();
    ANCHORS.get_or_init(|| Selector::parse("a[href]").expect("static selector is valid"))
}

// Extracts every http(s) link on the page as an absolute URL
fn extract_links(document: &Html, page_url: &str) -> Vec<String> {
    let base = match Url::parse(page_url) {
        Ok(url) => url,
        Err(_) => return Vec::new(),
    };

    document
        .select(anchor_selector())
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(&base, href))
        .collect()
}

// Resolves a link (possibly relative) to an absolute http(s) URL
fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();

    // Skip anchors and special protocols
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
    {
        return None;
    }

    let url = base.join(href).ok()?;
    if url.scheme() == "http" || url.scheme() == "https" {
        Some(url.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldConfig;

    fn nav(pattern: &str) -> RuleConfig {
        RuleConfig::Navigation {
            pattern: pattern.to_string(),
        }
    }

    fn extraction(pattern: &str, fields: &[(&str, &str)]) -> RuleConfig {
        RuleConfig::Extraction {
            pattern: pattern.to_string(),
            fields: fields
                .iter()
                .map(|(name, selector)| FieldConfig {
                    name: name.to_string(),
                    selector: selector.to_string(),
                })
                .collect(),
            follow: false,
        }
    }

    fn shop_rules() -> RuleSet {
        RuleSet::compile(&[
            nav("page="),
            extraction("product=", &[("title", "h1::text")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_matching_is_non_exclusive_and_ordered() {
        let rules = RuleSet::compile(&[
            nav("list"),
            extraction("list\\?page=", &[("title", "h1::text")]),
            nav("nothing-here"),
        ])
        .unwrap();

        let matched = rules.matching("http://x.com/list?page=1");
        let indexes: Vec<usize> = matched.iter().map(|r| r.index()).collect();
        assert_eq!(indexes, vec![0, 1]);
        assert_eq!(matched[0].kind(), "navigation");
        assert_eq!(matched[1].kind(), "extraction");
    }

    #[test]
    fn test_no_rule_matches() {
        let rules = shop_rules();
        assert!(rules.matching("http://x.com/about").is_empty());
    }

    #[test]
    fn test_should_follow() {
        let rules = shop_rules();
        let listing = rules.matching("http://x.com/list?page=2");
        let product = rules.matching("http://x.com/p?product=5");
        let other = rules.matching("http://x.com/about");

        assert!(should_follow(&listing, 3));
        assert!(!should_follow(&product, 1));
        assert!(should_follow(&other, 0));
        assert!(!should_follow(&other, 1));
    }

    #[test]
    fn test_extraction_rule_with_follow() {
        let rules = RuleSet::compile(&[RuleConfig::Extraction {
            pattern: "product=".to_string(),
            fields: vec![FieldConfig {
                name: "title".to_string(),
                selector: "h1::text".to_string(),
            }],
            follow: true,
        }])
        .unwrap();
        let matched = rules.matching("http://x.com/p?product=1");
        assert!(should_follow(&matched, 2));
    }

    #[test]
    fn test_follow_links_keeps_rule_targets_only() {
        let html = r##"
            <a href="/list?page=2">next</a>
            <a href="/p?product=5">tent</a>
            <a href="/p?product=5#reviews">tent again</a>
            <a href="/about">about</a>
            <a href="#top">top</a>
            <a href="mailto:shop@x.com?subject=page=1">mail</a>
        "##;
        let document = Html::parse_document(html);
        let links = shop_rules().follow_links(&document, "http://x.com/list?page=1");

        assert_eq!(
            links,
            vec!["http://x.com/list?page=2", "http://x.com/p?product=5"]
        );
    }

    #[test]
    fn test_follow_links_matches_normalized_query() {
        let rules = RuleSet::compile(&[
            extraction("product=5&ref", &[("title", "h1::text")]),
            nav("list\\?page=$"),
        ])
        .unwrap();
        let html = r#"
            <a href="/p?ref=home&amp;product=5">tent</a>
            <a href="/list?page">listing</a>
        "#;
        let document = Html::parse_document(html);
        let links = rules.follow_links(&document, "http://x.com/");

        // Query pairs are sorted and `?page` becomes `?page=` before matching
        assert_eq!(
            links,
            vec!["http://x.com/p?product=5&ref=home", "http://x.com/list?page="]
        );
        for link in &links {
            assert!(!rules.matching(link).is_empty());
        }
    }

    #[test]
    fn test_compile_rejects_invalid_pattern() {
        let result = RuleSet::compile(&[nav("page=(")]);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidPattern { index: 0, .. })
        ));
    }

    #[test]
    fn test_compile_rejects_duplicate_field() {
        let result = RuleSet::compile(&[
            nav("page="),
            extraction("product=", &[("title", "h1::text"), ("title", "h2::text")]),
        ]);
        match result {
            Err(ConfigError::DuplicateField { index, field }) => {
                assert_eq!(index, 1);
                assert_eq!(field, "title");
            }
            other => panic!("expected duplicate field error, got {other:?}"),
        }
    }

    #[test]
    fn test_compile_rejects_empty_fields_and_bad_selector() {
        assert!(matches!(
            RuleSet::compile(&[extraction("product=", &[])]),
            Err(ConfigError::NoFields { index: 0 })
        ));
        assert!(matches!(
            RuleSet::compile(&[extraction("product=", &[("title", "h1::html")])]),
            Err(ConfigError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_resolve_relative_link() {
        let base = Url::parse("https://example.com/page").unwrap();
        let result = resolve_link(&base, "/docs");
        assert_eq!(result, Some("https://example.com/docs".to_string()));
    }

    #[test]
    fn test_skip_anchor_and_mailto() {
        let base = Url::parse("https://example.com/page").unwrap();
        assert_eq!(resolve_link(&base, "#section"), None);
        assert_eq!(resolve_link(&base, "mailto:test@example.com"), None);
        assert_eq!(resolve_link(&base, "javascript:void(0)"), None);
    }
}
