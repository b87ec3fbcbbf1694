//! Queued fetch targets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of page a URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    /// A single for-sale listing.
    UnitSale,
    /// A single rental listing.
    UnitRental,
    /// A building page that links to many unit listings.
    Aggregate,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 3] = [Self::UnitSale, Self::UnitRental, Self::Aggregate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnitSale => "unit_sale",
            Self::UnitRental => "unit_rental",
            Self::Aggregate => "aggregate",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unit_sale" => Some(Self::UnitSale),
            "unit_rental" => Some(Self::UnitRental),
            "aggregate" => Some(Self::Aggregate),
            _ => None,
        }
    }

    /// Whether pages of this kind carry links to further listings.
    pub fn has_children(&self) -> bool {
        matches!(self, Self::Aggregate)
    }
}

impl std::fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a queued URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Pending,
    Fetched,
    Error,
}

impl WorkItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetched => "fetched",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "fetched" => Some(Self::Fetched),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One canonical URL awaiting (or done with) a snapshot fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: i32,
    /// Canonical URL; unique across the queue.
    pub url: String,
    pub category: ContentCategory,
    /// Site-assigned identifier (numeric id or building slug).
    pub external_id: String,
    /// Capture timestamp (14 digits) of the newest known snapshot.
    pub latest_timestamp: String,
    pub status: WorkItemStatus,
    pub error_message: Option<String>,
    pub attempt_count: i32,
    pub fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A URL the queue builder wants tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub url: String,
    pub category: ContentCategory,
    pub external_id: String,
    pub latest_timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for category in ContentCategory::ALL {
            assert_eq!(ContentCategory::from_str(category.as_str()), Some(category));
        }
        assert_eq!(ContentCategory::from_str("building"), None);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(WorkItemStatus::from_str("error"), Some(WorkItemStatus::Error));
        assert_eq!(WorkItemStatus::from_str("done"), None);
    }
}
