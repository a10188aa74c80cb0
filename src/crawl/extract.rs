// src/crawl/extract.rs
// =============================================================================
// This module turns a product page into a Record.
//
// Each field of an extraction rule has a selector string. It is a normal CSS
// selector, optionally followed by a pseudo-element that says WHAT to take
// from the matched element:
//
//   "h1#product-page-title::text"   -> the element's own text
//   "a.canonical::attr(href)"       -> the value of an attribute
//   "div.description"               -> all text inside the element
//
// A selector that finds nothing is normal (a product without ratings, say).
// The field is still present in the Record, just with no value.
//
// Rust concepts:
// - Option<String>: "a value or nothing", serialized to JSON as null
// - Custom Serialize: keeps the fields in the order the rule declared them
// =============================================================================

use scraper::{ElementRef, Html, Selector};
use serde::ser::{SerializeMap, SerializeStruct, Serializer};
use serde::Serialize;

use super::rules::ExtractionRule;

/// What to take from an element once the CSS part has matched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorTarget {
    /// `::text` - first non-blank text node directly inside the element
    OwnText,
    /// `::attr(name)` - an attribute value
    Attr(String),
    /// no suffix - every text node under the element, whitespace-collapsed
    AllText,
}

/// A compiled field selector.
#[derive(Debug, Clone)]
pub struct FieldSelector {
    raw: String,
    css: Selector,
    target: SelectorTarget,
}

impl FieldSelector {
    /// Parses "css", "css::text" or "css::attr(name)".
    ///
    /// The error is a human-readable reason; the rule compiler wraps it in a
    /// ConfigError with the rule and field names.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let (css_part, target) = match raw.rfind("::") {
            Some(pos) => {
                let suffix = &raw[pos + 2..];
                let target = if suffix == "text" {
                    SelectorTarget::OwnText
                } else if let Some(name) = suffix
                    .strip_prefix("attr(")
                    .and_then(|rest| rest.strip_suffix(')'))
                {
                    let name = name.trim();
                    if name.is_empty() {
                        return Err("empty attribute name in ::attr()".to_string());
                    }
                    SelectorTarget::Attr(name.to_string())
                } else {
                    return Err(format!("unsupported pseudo-element '::{}'", suffix));
                };
                (&raw[..pos], target)
            }
            None => (raw, SelectorTarget::AllText),
        };

        let css_part = css_part.trim();
        if css_part.is_empty() {
            return Err("empty CSS selector".to_string());
        }

        let css = Selector::parse(css_part).map_err(|e| e.to_string())?;

        Ok(Self {
            raw: raw.to_string(),
            css,
            target,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn target(&self) -> &SelectorTarget {
        &self.target
    }

    /// Applies the selector and returns the first match, if any.
    pub fn select_first(&self, document: &Html) -> Option<String> {
        document
            .select(&self.css)
            .find_map(|element| self.take(element))
    }

    fn take(&self, element: ElementRef<'_>) -> Option<String> {
        match &self.target {
            SelectorTarget::OwnText => element
                .children()
                .filter_map(|child| child.value().as_text())
                .map(|text| text.trim())
                .find(|text| !text.is_empty())
                .map(str::to_string),
            SelectorTarget::Attr(name) => element.value().attr(name).map(str::to_string),
            SelectorTarget::AllText => {
                let text = element.text().collect::<Vec<_>>().join(" ");
                let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if collapsed.is_empty() {
                    None
                } else {
                    Some(collapsed)
                }
            }
        }
    }
}

/// One structured output unit, produced from one page by one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The page the fields came from
    pub url: String,
    /// Index of the extraction rule in the config's rule list
    pub rule: usize,
    /// Field values in declaration order; None when the selector missed
    pub fields: Vec<(String, Option<String>)>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(field, _)| field == name)
    }
}

/// Serializes `fields` as a JSON object, keeping the declared order.
struct OrderedFields<'a>(&'a [(String, Option<String>)]);

impl Serialize for OrderedFields<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Record", 3)?;
        state.serialize_field("url", &self.url)?;
        state.serialize_field("rule", &self.rule)?;
        state.serialize_field("fields", &OrderedFields(&self.fields))?;
        state.end()
    }
}

/// Applies every field of `rule` to the page.
///
/// Never fails: each declared field is present, as a value or as None.
pub fn extract(document: &Html, page_url: &str, rule: &ExtractionRule) -> Record {
    let fields = rule
        .fields
        .iter()
        .map(|field| (field.name.clone(), field.selector.select_first(document)))
        .collect();

    Record {
        url: page_url.to_string(),
        rule: rule.index,
        fields,
    }
}
