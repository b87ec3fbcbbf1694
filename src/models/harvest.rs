use super::{HistoryEvent, ListingFacts};

/// Everything recovered from one snapshot, persisted as a unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Harvest {
    /// Archive URL the page body came from.
    pub snapshot_url: String,
    pub metadata: Option<ListingFacts>,
    pub events: Vec<HistoryEvent>,
    /// Canonical unit URLs linked from an aggregate page.
    pub child_urls: Vec<String>,
}

impl Harvest {
    pub fn has_data(&self) -> bool {
        self.metadata.is_some() || !self.events.is_empty()
    }
}
