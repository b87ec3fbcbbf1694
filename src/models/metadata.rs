//! Listing attributes recovered from a snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ContentCategory;

/// Attributes read from a page's analytics payload. Every field is optional;
/// pages vary wildly in what they expose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingFacts {
    pub price: Option<f64>,
    pub beds: Option<i32>,
    pub baths: Option<f64>,
    pub sqft: Option<f64>,
    pub price_per_sqft: Option<f64>,
    pub listing_status: Option<String>,
    pub listing_type: Option<String>,
    pub agent: Option<String>,
    pub brokerage: Option<String>,
    pub building_name: Option<String>,
    pub address: Option<String>,
    pub neighborhood: Option<String>,
    pub borough: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub year_built: Option<i32>,
    pub building_type: Option<String>,
    /// Amenity names as a JSON array.
    pub amenities: Option<String>,
    /// The payload the facts were read from, serialized as JSON.
    pub raw_payload: Option<String>,
}

impl ListingFacts {
    /// True when nothing beyond the raw payload was recognized.
    pub fn is_empty(&self) -> bool {
        *self
            == Self {
                raw_payload: self.raw_payload.clone(),
                ..Self::default()
            }
    }
}

/// Latest-write-wins metadata row for one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub url: String,
    pub external_id: Option<String>,
    pub category: Option<ContentCategory>,
    pub facts: ListingFacts,
    pub snapshot_timestamp: Option<String>,
    pub snapshot_url: Option<String>,
    pub extracted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_empty_ignores_raw_payload() {
        let facts = ListingFacts {
            raw_payload: Some("{}".to_string()),
            ..Default::default()
        };
        assert!(facts.is_empty());

        let facts = ListingFacts {
            beds: Some(2),
            ..Default::default()
        };
        assert!(!facts.is_empty());
    }
}
