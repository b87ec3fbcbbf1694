//! Free-text event label normalization.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{EventType, HistoryEvent};

/// Page furniture that ends up in history tables and JSON blobs.
const BOILERPLATE: &[&str] = &[
    "browse buildings",
    "market data",
    "facts",
    "building class",
    "district",
    "owned by",
    "documents and permits",
    "previously listed",
    "amenities",
    "floor plans",
    "schools",
    "transportation",
    "nearby buildings",
    "similar",
    "landmark",
    "historical",
];

static ACTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(listed|delisted|rented|sold)\s+by\s+(.+)$").unwrap());

static BARE_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s$0-9,.%+\-]*$").unwrap());

/// Keyword families checked in order; first hit wins.
const FAMILIES: &[(EventType, &[&str])] = &[
    (
        EventType::Delisted,
        &["no longer available", "no_longer_available", "delisted"],
    ),
    (EventType::Relisted, &["relisted"]),
    (
        EventType::PriceChange,
        &[
            "price decreased",
            "price increased",
            "price_decrease",
            "price_increase",
            "price change",
            "price_change",
        ],
    ),
    (
        EventType::Sold,
        &["sold", "previous sale recorded", "recorded_sale", "closing"],
    ),
    (EventType::Rented, &["rented"]),
    (EventType::Listed, &["listed"]),
];

/// A label mapped onto an event type.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLabel {
    pub event_type: EventType,
    pub broker: Option<String>,
}

/// Map a free-text label onto an event type.
///
/// Returns `None` for boilerplate that must not produce an event.
pub fn normalize_label(label: Option<&str>) -> Option<NormalizedLabel> {
    let label = label.map(str::trim).unwrap_or_default();
    let lowered = label.to_lowercase();

    if BOILERPLATE.iter().any(|b| lowered.contains(b)) {
        return None;
    }

    if let Some(caps) = ACTOR.captures(label) {
        let event_type = match caps[1].to_lowercase().as_str() {
            "listed" => EventType::Listed,
            "delisted" => EventType::Delisted,
            "rented" => EventType::Rented,
            _ => EventType::Sold,
        };
        return Some(NormalizedLabel {
            event_type,
            broker: Some(caps[2].trim().to_string()),
        });
    }

    if BARE_AMOUNT.is_match(label) {
        return Some(NormalizedLabel {
            event_type: EventType::PricePoint,
            broker: None,
        });
    }

    let event_type = FAMILIES
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lowered.contains(n)))
        .map(|(event_type, _)| *event_type)
        .unwrap_or(EventType::Other);

    Some(NormalizedLabel {
        event_type,
        broker: None,
    })
}

/// Raw pieces of one history entry, before normalization.
#[derive(Debug, Default)]
pub struct RawEvent {
    pub date: Option<String>,
    pub label: Option<String>,
    pub price: Option<f64>,
    pub price_delta: Option<f64>,
    pub broker: Option<String>,
    pub raw_json: Option<String>,
}

impl RawEvent {
    /// Normalize into a [`HistoryEvent`], or drop boilerplate and empty rows.
    ///
    /// A price point needs a price; a row with only a date is dropped.
    pub fn into_event(self, source: &'static str) -> Option<HistoryEvent> {
        let label = self.label.filter(|l| !l.trim().is_empty());
        if self.date.is_none() && self.price.is_none() && label.is_none() {
            return None;
        }

        let normalized = normalize_label(label.as_deref())?;
        if normalized.event_type == EventType::PricePoint && self.price.is_none() {
            return None;
        }
        Some(HistoryEvent {
            event_date: self.date,
            event_type: normalized.event_type,
            price: self.price,
            price_delta: self.price_delta,
            broker: self.broker.or(normalized.broker),
            description: label.map(|l| l.trim().to_string()),
            source,
            raw_json: self.raw_json,
        })
    }
}
