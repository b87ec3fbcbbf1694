//! Read side of harvested data: metadata, price events and child links.

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Integer, Nullable, Text};
use diesel_async::RunQueryDsl;
use serde::Serialize;

use super::models::{MetadataRecord, PriceEventRecord};
use super::pool::{DieselError, SqlitePool};
use crate::models::{ExtractedMetadata, PriceEvent};
use crate::schema::{discovered_child_urls, extracted_metadata, price_events};

/// Row counts across the harvest tables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestCounts {
    pub metadata: u64,
    pub price_events: u64,
    pub child_urls: u64,
}

/// One price event joined with its listing's metadata, as exported.
#[derive(Debug, Clone, QueryableByName, Serialize)]
pub struct ExportRow {
    #[serde(skip)]
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Text)]
    pub url: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub external_id: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub event_date: Option<String>,
    #[diesel(sql_type = Text)]
    pub event_type: String,
    #[diesel(sql_type = Nullable<Double>)]
    pub price: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    pub price_delta: Option<f64>,
    #[diesel(sql_type = Nullable<Text>)]
    pub broker: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub description: Option<String>,
    #[diesel(sql_type = Text)]
    pub source: String,
    #[diesel(sql_type = Nullable<Integer>)]
    pub beds: Option<i32>,
    #[diesel(sql_type = Nullable<Double>)]
    pub baths: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    pub sqft: Option<f64>,
    #[diesel(sql_type = Nullable<Text>)]
    pub address: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub neighborhood: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub borough: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub building_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub building_type: Option<String>,
}

/// Column names of the export, in [`ExportRow`] serialization order.
pub const EXPORT_HEADER: [&str; 17] = [
    "url",
    "external_id",
    "event_date",
    "event_type",
    "price",
    "price_delta",
    "broker",
    "description",
    "source",
    "beds",
    "baths",
    "sqft",
    "address",
    "neighborhood",
    "borough",
    "building_name",
    "building_type",
];

#[derive(QueryableByName)]
struct SourceCount {
    #[diesel(sql_type = Text)]
    source: String,
    #[diesel(sql_type = BigInt)]
    count: i64,
}

/// Diesel-backed repository over extracted data.
#[derive(Debug, Clone)]
pub struct ExtractedRepository {
    pool: SqlitePool,
}

impl ExtractedRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn counts(&self) -> Result<HarvestCounts, DieselError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;
        let metadata: i64 = extracted_metadata::table
            .select(count_star())
            .first(&mut conn)
            .await?;
        let events: i64 = price_events::table
            .select(count_star())
            .first(&mut conn)
            .await?;
        let children: i64 = discovered_child_urls::table
            .select(count_star())
            .first(&mut conn)
            .await?;

        Ok(HarvestCounts {
            metadata: metadata as u64,
            price_events: events as u64,
            child_urls: children as u64,
        })
    }

    /// Price event counts per extraction strategy, largest first.
    pub async fn events_by_source(&self) -> Result<Vec<(String, u64)>, DieselError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<SourceCount> = diesel::sql_query(
            "SELECT source, COUNT(*) AS count FROM price_events \
             GROUP BY source ORDER BY count DESC, source",
        )
        .load(&mut conn)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.source, r.count as u64))
            .collect())
    }

    /// Export rows with `id > after_id`, in id order.
    ///
    /// Callers page through the table by passing the last id they saw.
    pub async fn export_page(
        &self,
        after_id: i32,
        limit: i64,
    ) -> Result<Vec<ExportRow>, DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::sql_query(
            "SELECT pe.id, pe.url, pe.external_id, pe.event_date, pe.event_type, pe.price, \
                    pe.price_delta, pe.broker, pe.description, pe.source, \
                    m.beds, m.baths, m.sqft, m.address, m.neighborhood, m.borough, \
                    m.building_name, m.building_type \
             FROM price_events pe \
             LEFT JOIN extracted_metadata m ON m.url = pe.url \
             WHERE pe.id > ? \
             ORDER BY pe.id \
             LIMIT ?",
        )
        .bind::<Integer, _>(after_id)
        .bind::<BigInt, _>(limit)
        .load(&mut conn)
        .await
    }

    pub async fn events_for_url(&self, url: &str) -> Result<Vec<PriceEvent>, DieselError> {
        let mut conn = self.pool.get().await?;
        let records: Vec<PriceEventRecord> = price_events::table
            .filter(price_events::url.eq(url))
            .order(price_events::id.asc())
            .load(&mut conn)
            .await?;
        Ok(records.into_iter().map(PriceEvent::from).collect())
    }

    pub async fn metadata_for_url(
        &self,
        url: &str,
    ) -> Result<Option<ExtractedMetadata>, DieselError> {
        let mut conn = self.pool.get().await?;
        extracted_metadata::table
            .filter(extracted_metadata::url.eq(url))
            .first::<MetadataRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(ExtractedMetadata::from))
    }

    /// Child URLs discovered on a given parent page.
    pub async fn children_of(&self, parent_url: &str) -> Result<Vec<String>, DieselError> {
        let mut conn = self.pool.get().await?;
        discovered_child_urls::table
            .filter(discovered_child_urls::parent_url.eq(parent_url))
            .select(discovered_child_urls::child_url)
            .order(discovered_child_urls::child_url.asc())
            .load(&mut conn)
            .await
    }
}
