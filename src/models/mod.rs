//! Data models for listing-history.

mod harvest;
mod metadata;
mod price_event;
mod snapshot;
mod work_item;

pub use harvest::Harvest;
pub use metadata::{ExtractedMetadata, ListingFacts};
pub use price_event::{EventType, HistoryEvent, PriceEvent};
pub use snapshot::SnapshotRecord;
pub use work_item::{ContentCategory, QueueEntry, WorkItem, WorkItemStatus};
