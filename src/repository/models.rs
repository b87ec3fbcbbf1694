//! Diesel ORM models for database tables.
//!
//! Timestamps are stored as RFC 3339 text; enums as their `as_str` names.

use diesel::prelude::*;

use super::util::{parse_datetime, parse_datetime_opt};
use crate::models::{
    ContentCategory, EventType, ExtractedMetadata, ListingFacts, PriceEvent, WorkItem,
    WorkItemStatus,
};
use crate::schema;

/// Work item record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::work_items)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WorkItemRecord {
    pub id: i32,
    pub url: String,
    pub content_category: String,
    pub external_id: String,
    pub latest_timestamp: String,
    pub status: String,
    pub error_message: Option<String>,
    pub attempt_count: i32,
    pub fetched_at: Option<String>,
    pub created_at: String,
}

/// New work item for insertion.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = schema::work_items)]
pub struct NewWorkItem<'a> {
    pub url: &'a str,
    pub content_category: &'a str,
    pub external_id: &'a str,
    pub latest_timestamp: &'a str,
    pub status: &'a str,
    pub attempt_count: i32,
    pub created_at: &'a str,
}

impl From<WorkItemRecord> for WorkItem {
    fn from(record: WorkItemRecord) -> Self {
        WorkItem {
            id: record.id,
            url: record.url,
            category: ContentCategory::from_str(&record.content_category)
                .unwrap_or(ContentCategory::Aggregate),
            external_id: record.external_id,
            latest_timestamp: record.latest_timestamp,
            status: WorkItemStatus::from_str(&record.status).unwrap_or(WorkItemStatus::Pending),
            error_message: record.error_message,
            attempt_count: record.attempt_count,
            fetched_at: parse_datetime_opt(record.fetched_at),
            created_at: parse_datetime(&record.created_at),
        }
    }
}

/// Extracted metadata record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::extracted_metadata)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MetadataRecord {
    pub id: i32,
    pub url: String,
    pub external_id: Option<String>,
    pub content_category: Option<String>,
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
    pub amenities: Option<String>,
    pub raw_payload: Option<String>,
    pub snapshot_timestamp: Option<String>,
    pub snapshot_url: Option<String>,
    pub extracted_at: String,
}

/// Metadata row for insert-or-replace.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::extracted_metadata)]
pub struct NewMetadata<'a> {
    pub url: &'a str,
    pub external_id: Option<&'a str>,
    pub content_category: Option<&'a str>,
    pub price: Option<f64>,
    pub beds: Option<i32>,
    pub baths: Option<f64>,
    pub sqft: Option<f64>,
    pub price_per_sqft: Option<f64>,
    pub listing_status: Option<&'a str>,
    pub listing_type: Option<&'a str>,
    pub agent: Option<&'a str>,
    pub brokerage: Option<&'a str>,
    pub building_name: Option<&'a str>,
    pub address: Option<&'a str>,
    pub neighborhood: Option<&'a str>,
    pub borough: Option<&'a str>,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub zipcode: Option<&'a str>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub year_built: Option<i32>,
    pub building_type: Option<&'a str>,
    pub amenities: Option<&'a str>,
    pub raw_payload: Option<&'a str>,
    pub snapshot_timestamp: Option<&'a str>,
    pub snapshot_url: Option<&'a str>,
    pub extracted_at: String,
}

impl<'a> From<&'a ExtractedMetadata> for NewMetadata<'a> {
    fn from(meta: &'a ExtractedMetadata) -> Self {
        let facts = &meta.facts;
        NewMetadata {
            url: &meta.url,
            external_id: meta.external_id.as_deref(),
            content_category: meta.category.map(|c| c.as_str()),
            price: facts.price,
            beds: facts.beds,
            baths: facts.baths,
            sqft: facts.sqft,
            price_per_sqft: facts.price_per_sqft,
            listing_status: facts.listing_status.as_deref(),
            listing_type: facts.listing_type.as_deref(),
            agent: facts.agent.as_deref(),
            brokerage: facts.brokerage.as_deref(),
            building_name: facts.building_name.as_deref(),
            address: facts.address.as_deref(),
            neighborhood: facts.neighborhood.as_deref(),
            borough: facts.borough.as_deref(),
            city: facts.city.as_deref(),
            state: facts.state.as_deref(),
            zipcode: facts.zipcode.as_deref(),
            latitude: facts.latitude,
            longitude: facts.longitude,
            year_built: facts.year_built,
            building_type: facts.building_type.as_deref(),
            amenities: facts.amenities.as_deref(),
            raw_payload: facts.raw_payload.as_deref(),
            snapshot_timestamp: meta.snapshot_timestamp.as_deref(),
            snapshot_url: meta.snapshot_url.as_deref(),
            extracted_at: meta.extracted_at.to_rfc3339(),
        }
    }
}

impl From<MetadataRecord> for ExtractedMetadata {
    fn from(record: MetadataRecord) -> Self {
        ExtractedMetadata {
            url: record.url,
            external_id: record.external_id,
            category: record
                .content_category
                .as_deref()
                .and_then(ContentCategory::from_str),
            facts: ListingFacts {
                price: record.price,
                beds: record.beds,
                baths: record.baths,
                sqft: record.sqft,
                price_per_sqft: record.price_per_sqft,
                listing_status: record.listing_status,
                listing_type: record.listing_type,
                agent: record.agent,
                brokerage: record.brokerage,
                building_name: record.building_name,
                address: record.address,
                neighborhood: record.neighborhood,
                borough: record.borough,
                city: record.city,
                state: record.state,
                zipcode: record.zipcode,
                latitude: record.latitude,
                longitude: record.longitude,
                year_built: record.year_built,
                building_type: record.building_type,
                amenities: record.amenities,
                raw_payload: record.raw_payload,
            },
            snapshot_timestamp: record.snapshot_timestamp,
            snapshot_url: record.snapshot_url,
            extracted_at: parse_datetime(&record.extracted_at),
        }
    }
}

/// Price event record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::price_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PriceEventRecord {
    pub id: i32,
    pub url: String,
    pub external_id: Option<String>,
    pub event_date: Option<String>,
    pub event_type: String,
    pub price: Option<f64>,
    pub price_delta: Option<f64>,
    pub broker: Option<String>,
    pub description: Option<String>,
    pub source: String,
    pub raw_json: Option<String>,
    pub extracted_at: String,
}

/// New price event for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::price_events)]
pub struct NewPriceEvent<'a> {
    pub url: &'a str,
    pub external_id: Option<&'a str>,
    pub event_date: Option<&'a str>,
    pub event_type: &'a str,
    pub price: Option<f64>,
    pub price_delta: Option<f64>,
    pub broker: Option<&'a str>,
    pub description: Option<&'a str>,
    pub source: &'a str,
    pub raw_json: Option<&'a str>,
    pub extracted_at: &'a str,
}

impl From<PriceEventRecord> for PriceEvent {
    fn from(record: PriceEventRecord) -> Self {
        PriceEvent {
            id: record.id,
            url: record.url,
            external_id: record.external_id,
            event_date: record.event_date,
            event_type: EventType::from_str(&record.event_type).unwrap_or(EventType::Other),
            price: record.price,
            price_delta: record.price_delta,
            broker: record.broker,
            description: record.description,
            source: record.source,
            raw_json: record.raw_json,
            extracted_at: parse_datetime(&record.extracted_at),
        }
    }
}

/// New parent-to-child link for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::discovered_child_urls)]
pub struct NewChildUrl<'a> {
    pub parent_url: &'a str,
    pub child_url: &'a str,
    pub discovered_at: &'a str,
}
