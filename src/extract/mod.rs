//! Page extraction.
//!
//! Archived listing pages drifted through several markup generations, so
//! extraction is an ordered list of independent strategies. Every strategy
//! runs against every page; metadata comes from the first strategy that
//! produces any, events accumulate from all of them. Extraction is pure and
//! never does I/O.

mod analytics;
mod events;
mod history;
mod links;
mod table;
pub mod text;

use std::cell::OnceCell;

use scraper::Html;
use serde_json::Value;
use thiserror::Error;

pub use analytics::AnalyticsPayload;
pub use events::{normalize_label, NormalizedLabel};
pub use history::EmbeddedHistory;
pub use links::ChildLinkExtractor;
pub use table::HistoryTable;

use crate::config::SiteProfile;
use crate::models::{ContentCategory, Harvest, HistoryEvent, ListingFacts};

/// Errors building or running the extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("extraction aborted: {0}")]
    Aborted(String),
}

/// A fetched page under extraction. The HTML tree is parsed on first use.
pub struct Page<'a> {
    pub url: &'a str,
    pub content: &'a str,
    document: OnceCell<Html>,
}

impl<'a> Page<'a> {
    pub fn new(url: &'a str, content: &'a str) -> Self {
        Self {
            url,
            content,
            document: OnceCell::new(),
        }
    }

    pub fn document(&self) -> &Html {
        self.document
            .get_or_init(|| Html::parse_document(self.content))
    }
}

/// What one strategy recovered.
#[derive(Debug, Default)]
pub struct StrategyOutput {
    pub metadata: Option<ListingFacts>,
    pub events: Vec<HistoryEvent>,
}

/// One way of reading listing data out of a page.
pub trait ExtractionStrategy: Send + Sync {
    /// Stable name, recorded as the `source` of every event it yields.
    fn name(&self) -> &'static str;

    fn try_extract(&self, page: &Page) -> Option<StrategyOutput>;
}

/// Parse the JSON value starting at byte `pos`, ignoring whatever follows it.
pub(crate) fn json_at(content: &str, pos: usize) -> Option<Value> {
    let rest = content.get(pos..)?;
    serde_json::Deserializer::from_str(rest)
        .into_iter::<Value>()
        .next()?
        .ok()
}

/// Strategy pipeline plus the aggregate-page link pass.
pub struct Extractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    child_links: Option<ChildLinkExtractor>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            strategies: vec![
                Box::new(AnalyticsPayload),
                Box::new(EmbeddedHistory),
                Box::new(HistoryTable),
            ],
            child_links: None,
        }
    }
}

impl Extractor {
    /// Default strategies plus child-link discovery for the profile's site.
    pub fn for_site(profile: &SiteProfile) -> Result<Self, ExtractError> {
        Ok(Self {
            child_links: Some(ChildLinkExtractor::new(profile)?),
            ..Self::default()
        })
    }

    /// Append a strategy after the built-in ones.
    pub fn with_strategy(mut self, strategy: Box<dyn ExtractionStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run every strategy over the page.
    pub fn extract(&self, content: &str, url: &str) -> (Option<ListingFacts>, Vec<HistoryEvent>) {
        let page = Page::new(url, content);
        let mut metadata = None;
        let mut events = Vec::new();

        for strategy in &self.strategies {
            let Some(output) = strategy.try_extract(&page) else {
                continue;
            };
            tracing::trace!(
                "{}: {} yielded {} events",
                url,
                strategy.name(),
                output.events.len()
            );
            if metadata.is_none() {
                metadata = output.metadata;
            }
            events.extend(output.events);
        }

        (metadata, events)
    }

    /// Child unit URLs referenced by an aggregate page.
    pub fn extract_child_links(&self, content: &str, url: &str) -> Vec<String> {
        self.child_links
            .as_ref()
            .map(|links| links.extract(content, url))
            .unwrap_or_default()
    }

    /// Everything recovered from one snapshot of a queued URL.
    pub fn harvest(
        &self,
        content: &str,
        url: &str,
        category: ContentCategory,
        snapshot_url: &str,
    ) -> Harvest {
        let (metadata, events) = self.extract(content, url);
        let child_urls = if category.has_children() {
            self.extract_child_links(content, url)
        } else {
            Vec::new()
        };
        Harvest {
            snapshot_url: snapshot_url.to_string(),
            metadata,
            events,
            child_urls,
        }
    }
}
