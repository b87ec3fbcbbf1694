//! Embedded price-history JSON strategy.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::events::RawEvent;
use super::text::{first_value, parse_date, value_f64, value_string};
use super::{json_at, ExtractionStrategy, Page, StrategyOutput};

static HISTORY_ARRAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#""(?:pastListings|past_listings|listing_history|priceHistory|price_history)"\s*:\s*"#,
    )
    .unwrap()
});

// The component props object starts at the first brace after the name.
static PAST_LISTINGS_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""PastListingsExperience"[^{]{0,200}"#).unwrap());

const COMPONENT_LIST_KEYS: &[&str] = &["listings", "pastListings", "items", "history"];

const DATE_KEYS: &[&str] = &["date", "eventDate", "event_date", "closingDate", "listedDate"];
const LABEL_KEYS: &[&str] = &["event", "eventType", "event_type", "type", "status"];
const PRICE_KEYS: &[&str] = &["price", "listPrice", "salePrice", "amount"];
const DELTA_KEYS: &[&str] = &["priceChange", "price_change"];
const BROKER_KEYS: &[&str] = &["broker", "agent", "brokerage"];

pub struct EmbeddedHistory;

impl EmbeddedHistory {
    fn history_arrays(content: &str) -> Vec<Value> {
        HISTORY_ARRAY
            .find_iter(content)
            .filter_map(|m| json_at(content, m.end()))
            .filter_map(|value| match value {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn component_items(content: &str) -> Vec<Value> {
        let mut items = Vec::new();
        for m in PAST_LISTINGS_COMPONENT.find_iter(content) {
            if !content[m.end()..].starts_with('{') {
                continue;
            }
            let Some(Value::Object(props)) = json_at(content, m.end()) else {
                continue;
            };
            let before = items.len();
            for key in COMPONENT_LIST_KEYS {
                if let Some(Value::Array(list)) = props.get(*key) {
                    items.extend(list.iter().cloned());
                }
            }
            if items.len() == before {
                items.push(Value::Object(props));
            }
        }
        items
    }
}

impl ExtractionStrategy for EmbeddedHistory {
    fn name(&self) -> &'static str {
        "embedded_history"
    }

    fn try_extract(&self, page: &Page) -> Option<StrategyOutput> {
        let mut items = Self::history_arrays(page.content);
        if items.is_empty() {
            items = Self::component_items(page.content);
        }

        let events: Vec<_> = items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|item| raw_event(item).into_event(self.name()))
            .collect();

        (!events.is_empty()).then(|| StrategyOutput {
            metadata: None,
            events,
        })
    }
}

fn raw_event(item: &Map<String, Value>) -> RawEvent {
    // Dates that do not parse are kept as the site wrote them.
    let date = first_value(item, DATE_KEYS)
        .and_then(value_string)
        .map(|raw| parse_date(&raw).unwrap_or(raw));

    RawEvent {
        date,
        label: first_value(item, LABEL_KEYS).and_then(value_string),
        price: first_value(item, PRICE_KEYS).and_then(value_f64),
        price_delta: first_value(item, DELTA_KEYS).and_then(value_f64),
        broker: first_value(item, BROKER_KEYS).and_then(value_string),
        raw_json: Some(Value::Object(item.clone()).to_string()),
    }
}
