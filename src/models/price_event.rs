//! Historical listing events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized kind of a historical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Listed,
    Delisted,
    Sold,
    Rented,
    PriceChange,
    Relisted,
    /// A bare price observation with no event label.
    PricePoint,
    Other,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listed => "listed",
            Self::Delisted => "delisted",
            Self::Sold => "sold",
            Self::Rented => "rented",
            Self::PriceChange => "price_change",
            Self::Relisted => "relisted",
            Self::PricePoint => "price_point",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "listed" => Some(Self::Listed),
            "delisted" => Some(Self::Delisted),
            "sold" => Some(Self::Sold),
            "rented" => Some(Self::Rented),
            "price_change" => Some(Self::PriceChange),
            "relisted" => Some(Self::Relisted),
            "price_point" => Some(Self::PricePoint),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// An event as read off a page, before it is tied to a queued URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEvent {
    /// ISO `YYYY-MM-DD`.
    pub event_date: Option<String>,
    pub event_type: EventType,
    pub price: Option<f64>,
    pub price_delta: Option<f64>,
    pub broker: Option<String>,
    /// Source label when it did not map onto a known event type.
    pub description: Option<String>,
    /// Name of the extraction strategy that produced the event.
    pub source: &'static str,
    pub raw_json: Option<String>,
}

/// Persisted event row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEvent {
    pub id: i32,
    pub url: String,
    pub external_id: Option<String>,
    pub event_date: Option<String>,
    pub event_type: EventType,
    pub price: Option<f64>,
    pub price_delta: Option<f64>,
    pub broker: Option<String>,
    pub description: Option<String>,
    pub source: String,
    pub raw_json: Option<String>,
    pub extracted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        assert_eq!(EventType::PriceChange.as_str(), "price_change");
        assert_eq!(EventType::from_str("price_point"), Some(EventType::PricePoint));
        assert_eq!(EventType::from_str("PRICE_DECREASE"), None);
    }
}
