//! Analytics payload strategy.
//!
//! Listing pages push a flat-ish object into the tag manager's `dataLayer`.
//! It is the most reliable source of point-in-time listing facts.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::text::{first_value, value_f64, value_i32, value_string};
use super::{json_at, ExtractionStrategy, Page, StrategyOutput};
use crate::models::ListingFacts;

static DATA_LAYER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:dataLayer\s*=\s*\[|dataLayer\.push\s*\()\s*").unwrap()
});

/// A payload must carry at least one of these to count as listing data.
const RECOGNIZED_KEYS: &[&str] = &[
    "listing",
    "property",
    "price",
    "listingPrice",
    "beds",
    "propertyType",
    "address",
    "buildingName",
    "neighborhood",
    "ecommerce",
];

pub struct AnalyticsPayload;

impl ExtractionStrategy for AnalyticsPayload {
    fn name(&self) -> &'static str {
        "analytics_payload"
    }

    fn try_extract(&self, page: &Page) -> Option<StrategyOutput> {
        let payload = DATA_LAYER
            .find_iter(page.content)
            .filter_map(|m| json_at(page.content, m.end()))
            .filter_map(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .find(|map| RECOGNIZED_KEYS.iter().any(|k| map.contains_key(*k)))?;

        // A payload with no known fields leaves metadata to later strategies.
        let facts = facts_from_payload(&payload);
        if facts.is_empty() {
            return None;
        }
        Some(StrategyOutput {
            metadata: Some(facts),
            events: Vec::new(),
        })
    }
}

/// Nested objects are lifted one level; later keys overwrite earlier ones.
fn flatten(payload: &Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    for (key, value) in payload {
        match value {
            Value::Object(inner) => {
                for (k, v) in inner {
                    flat.insert(k.clone(), v.clone());
                }
            }
            other => {
                flat.insert(key.clone(), other.clone());
            }
        }
    }
    flat
}

fn facts_from_payload(payload: &Map<String, Value>) -> ListingFacts {
    let flat = flatten(payload);
    let f64_of = |aliases: &[&str]| first_value(&flat, aliases).and_then(value_f64);
    let i32_of = |aliases: &[&str]| first_value(&flat, aliases).and_then(value_i32);
    let str_of = |aliases: &[&str]| first_value(&flat, aliases).and_then(value_string);

    ListingFacts {
        price: f64_of(&["price", "listingPrice", "listing_price"]),
        beds: i32_of(&["beds", "bedrooms", "numBedrooms"]),
        baths: f64_of(&["baths", "bathrooms", "numBathrooms"]),
        sqft: f64_of(&["sqft", "squareFeet", "area"]),
        price_per_sqft: f64_of(&["ppsf", "pricePerSqFt"]),
        listing_status: str_of(&["status", "listingStatus"]),
        listing_type: str_of(&["listingType", "listing_type", "propertyType"]),
        agent: str_of(&["agent", "agentName", "listing_agent"]),
        brokerage: str_of(&["brokerage", "brokerageName", "office"]),
        building_name: str_of(&["buildingName", "building_name"]),
        address: str_of(&["address", "streetAddress"]),
        neighborhood: str_of(&["neighborhood", "area_name"]),
        borough: str_of(&["borough", "city"]),
        city: str_of(&["city"]),
        state: str_of(&["state"]),
        zipcode: str_of(&["zipcode", "postalCode"]),
        latitude: f64_of(&["latitude", "lat"]),
        longitude: f64_of(&["longitude", "lng", "lon"]),
        year_built: i32_of(&["yearBuilt", "year_built"]),
        building_type: str_of(&["buildingType", "building_type"]),
        amenities: first_value(&flat, &["amenities"])
            .filter(|v| !matches!(v, Value::Array(a) if a.is_empty()))
            .map(Value::to_string),
        raw_payload: Some(Value::Object(payload.clone()).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Option<ListingFacts> {
        AnalyticsPayload
            .try_extract(&Page::new("https://streeteasy.com/sale/1", html))
            .and_then(|out| out.metadata)
    }

    #[test]
    fn test_reads_nested_payload() {
        let html = r#"<script>
            window.dataLayer = [{"event": "pageview", "listing": {"price": "$1,150,000",
              "bedrooms": 2, "bathrooms": "1.5", "lat": 40.7, "lng": -73.9,
              "amenities": ["doorman", "gym"], "address": {"ignored": true}},
              "buildingName": "The Dakota", "city": "New York"}];
        </script>"#;
        let facts = extract(html).unwrap();
        assert_eq!(facts.price, Some(1_150_000.0));
        assert_eq!(facts.beds, Some(2));
        assert_eq!(facts.baths, Some(1.5));
        assert_eq!(facts.latitude, Some(40.7));
        assert_eq!(facts.longitude, Some(-73.9));
        assert_eq!(facts.building_name.as_deref(), Some("The Dakota"));
        assert_eq!(facts.borough.as_deref(), Some("New York"));
        assert_eq!(facts.amenities.as_deref(), Some(r#"["doorman","gym"]"#));
        assert!(facts.raw_payload.unwrap().contains("pageview"));
    }

    #[test]
    fn test_push_form_and_unrecognized_payloads() {
        let html = r#"
            dataLayer.push({"event": "gtm.js"});
            dataLayer.push({"beds": "3", "propertyType": "condo"});
        "#;
        let facts = extract(html).unwrap();
        assert_eq!(facts.beds, Some(3));
        assert_eq!(facts.listing_type.as_deref(), Some("condo"));
    }

    #[test]
    fn test_no_payload() {
        assert!(extract("<html><body>nothing here</body></html>").is_none());
        assert!(extract("dataLayer = [{ broken json").is_none());
    }

    #[test]
    fn test_payload_without_known_fields_is_skipped() {
        let html = r#"dataLayer = [{"event": "pageview", "listing": {"pageType": "pdp"}}];"#;
        assert!(extract(html).is_none());
    }
}
