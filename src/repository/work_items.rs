//! Work item repository: the fetch queue and its state transitions.

use std::collections::HashMap;

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::models::{
    NewChildUrl, NewMetadata, NewPriceEvent, NewWorkItem, WorkItemRecord,
};
use super::pool::{DieselError, SqlitePool};
use super::util::truncate_message;
use crate::models::{
    ContentCategory, ExtractedMetadata, Harvest, QueueEntry, WorkItem, WorkItemStatus,
};
use crate::schema::{discovered_child_urls, extracted_metadata, price_events, work_items};

/// What the queue already knows about a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownItem {
    pub latest_timestamp: String,
    pub status: WorkItemStatus,
}

/// Queue size broken down by status and category.
#[derive(Debug, Clone, Default)]
pub struct QueueCounts {
    pub by_status: HashMap<WorkItemStatus, u64>,
    pub by_category: HashMap<ContentCategory, HashMap<WorkItemStatus, u64>>,
}

impl QueueCounts {
    pub fn total(&self) -> u64 {
        self.by_status.values().sum()
    }

    pub fn status(&self, status: WorkItemStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Diesel-backed work item repository.
#[derive(Debug, Clone)]
pub struct WorkItemRepository {
    pool: SqlitePool,
}

impl WorkItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load every queued URL with its newest timestamp and status.
    pub async fn known_urls(&self) -> Result<HashMap<String, KnownItem>, DieselError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<(String, String, String)> = work_items::table
            .select((
                work_items::url,
                work_items::latest_timestamp,
                work_items::status,
            ))
            .load(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(url, latest_timestamp, status)| {
                let status = WorkItemStatus::from_str(&status).unwrap_or(WorkItemStatus::Pending);
                (
                    url,
                    KnownItem {
                        latest_timestamp,
                        status,
                    },
                )
            })
            .collect())
    }

    /// Insert new pending items, skipping URLs that already exist.
    ///
    /// Returns the number of rows actually inserted.
    pub async fn insert_new(&self, entries: &[QueueEntry]) -> Result<usize, DieselError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let entries = entries.to_vec();
        let created_at = Utc::now().to_rfc3339();

        let mut conn = self.pool.get().await?;
        conn.transaction::<_, DieselError, _>(move |conn| {
            Box::pin(async move {
                let mut inserted = 0;
                for entry in &entries {
                    let row = NewWorkItem {
                        url: &entry.url,
                        content_category: entry.category.as_str(),
                        external_id: &entry.external_id,
                        latest_timestamp: &entry.latest_timestamp,
                        status: WorkItemStatus::Pending.as_str(),
                        attempt_count: 0,
                        created_at: &created_at,
                    };
                    inserted += diesel::insert_or_ignore_into(work_items::table)
                        .values(row)
                        .execute(conn)
                        .await?;
                }
                Ok(inserted)
            })
        })
        .await
    }

    /// Move still-pending items forward to a newer snapshot timestamp.
    ///
    /// Only ever advances; an older timestamp never replaces a newer one.
    pub async fn advance_timestamps(
        &self,
        updates: &[(String, String)],
    ) -> Result<usize, DieselError> {
        if updates.is_empty() {
            return Ok(0);
        }
        let updates = updates.to_vec();

        let mut conn = self.pool.get().await?;
        conn.transaction::<_, DieselError, _>(move |conn| {
            Box::pin(async move {
                let mut advanced = 0;
                for (url, timestamp) in &updates {
                    advanced += diesel::update(
                        work_items::table
                            .filter(work_items::url.eq(url))
                            .filter(work_items::status.eq(WorkItemStatus::Pending.as_str()))
                            .filter(work_items::latest_timestamp.lt(timestamp)),
                    )
                    .set(work_items::latest_timestamp.eq(timestamp))
                    .execute(conn)
                    .await?;
                }
                Ok(advanced)
            })
        })
        .await
    }

    /// Pending items in queue order, optionally filtered by category.
    pub async fn pending(
        &self,
        limit: Option<usize>,
        category: Option<ContentCategory>,
    ) -> Result<Vec<WorkItem>, DieselError> {
        let mut conn = self.pool.get().await?;
        let mut query = work_items::table
            .filter(work_items::status.eq(WorkItemStatus::Pending.as_str()))
            .order(work_items::id.asc())
            .into_boxed();

        if let Some(category) = category {
            query = query.filter(work_items::content_category.eq(category.as_str()));
        }
        if let Some(limit) = limit {
            query = query.limit(limit as i64);
        }

        let records: Vec<WorkItemRecord> = query.load(&mut conn).await?;
        Ok(records.into_iter().map(WorkItem::from).collect())
    }

    /// Look up a single item by canonical URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<WorkItem>, DieselError> {
        let mut conn = self.pool.get().await?;
        work_items::table
            .filter(work_items::url.eq(url))
            .first::<WorkItemRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(WorkItem::from))
    }

    /// Persist a harvest and mark the item fetched, atomically.
    ///
    /// The status change is guarded on the item still being pending; if it
    /// is not (another run got there first), nothing is written and `false`
    /// is returned.
    pub async fn record_success(
        &self,
        item: &WorkItem,
        harvest: &Harvest,
    ) -> Result<bool, DieselError> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let item_id = item.id;
        let url = item.url.clone();
        let external_id = item.external_id.clone();
        let metadata = harvest.metadata.clone().map(|facts| ExtractedMetadata {
            url: item.url.clone(),
            external_id: Some(item.external_id.clone()),
            category: Some(item.category),
            facts,
            snapshot_timestamp: Some(item.latest_timestamp.clone()),
            snapshot_url: Some(harvest.snapshot_url.clone()),
            extracted_at: now,
        });
        let events = harvest.events.clone();
        let child_urls = harvest.child_urls.clone();

        let mut conn = self.pool.get().await?;
        let result = conn
            .transaction::<_, DieselError, _>(move |conn| {
                Box::pin(async move {
                    let updated = diesel::update(
                        work_items::table
                            .filter(work_items::id.eq(item_id))
                            .filter(work_items::status.eq(WorkItemStatus::Pending.as_str())),
                    )
                    .set((
                        work_items::status.eq(WorkItemStatus::Fetched.as_str()),
                        work_items::fetched_at.eq(Some(now_str.as_str())),
                        work_items::error_message.eq(None::<String>),
                        work_items::attempt_count.eq(work_items::attempt_count + 1),
                    ))
                    .execute(conn)
                    .await?;

                    if updated == 0 {
                        return Err(DieselError::RollbackTransaction);
                    }

                    if let Some(ref meta) = metadata {
                        diesel::replace_into(extracted_metadata::table)
                            .values(NewMetadata::from(meta))
                            .execute(conn)
                            .await?;
                    }

                    for event in &events {
                        diesel::insert_into(price_events::table)
                            .values(NewPriceEvent {
                                url: &url,
                                external_id: Some(&external_id),
                                event_date: event.event_date.as_deref(),
                                event_type: event.event_type.as_str(),
                                price: event.price,
                                price_delta: event.price_delta,
                                broker: event.broker.as_deref(),
                                description: event.description.as_deref(),
                                source: event.source,
                                raw_json: event.raw_json.as_deref(),
                                extracted_at: &now_str,
                            })
                            .execute(conn)
                            .await?;
                    }

                    for child in &child_urls {
                        diesel::insert_or_ignore_into(discovered_child_urls::table)
                            .values(NewChildUrl {
                                parent_url: &url,
                                child_url: child,
                                discovered_at: &now_str,
                            })
                            .execute(conn)
                            .await?;
                    }

                    Ok(())
                })
            })
            .await;

        match result {
            Ok(()) => Ok(true),
            Err(DieselError::RollbackTransaction) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Mark a pending item failed, recording a truncated message.
    pub async fn record_failure(&self, item_id: i32, message: &str) -> Result<bool, DieselError> {
        let message = truncate_message(message);
        let now = Utc::now().to_rfc3339();
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(
            work_items::table
                .filter(work_items::id.eq(item_id))
                .filter(work_items::status.eq(WorkItemStatus::Pending.as_str())),
        )
        .set((
            work_items::status.eq(WorkItemStatus::Error.as_str()),
            work_items::error_message.eq(Some(message.as_str())),
            work_items::attempt_count.eq(work_items::attempt_count + 1),
            work_items::fetched_at.eq(Some(now.as_str())),
        ))
        .execute(&mut conn)
        .await?;
        Ok(updated > 0)
    }

    /// Return failed items with fewer than `max_attempts` attempts to pending.
    pub async fn retry_errors(&self, max_attempts: u32) -> Result<usize, DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::update(
            work_items::table
                .filter(work_items::status.eq(WorkItemStatus::Error.as_str()))
                .filter(work_items::attempt_count.lt(max_attempts as i32)),
        )
        .set(work_items::status.eq(WorkItemStatus::Pending.as_str()))
        .execute(&mut conn)
        .await
    }

    /// Item counts grouped by status and category.
    pub async fn counts(&self) -> Result<QueueCounts, DieselError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;
        let rows: Vec<(String, String, i64)> = work_items::table
            .group_by((work_items::status, work_items::content_category))
            .select((
                work_items::status,
                work_items::content_category,
                count_star(),
            ))
            .load(&mut conn)
            .await?;

        let mut counts = QueueCounts::default();
        for (status, category, count) in rows {
            let (Some(status), Some(category)) = (
                WorkItemStatus::from_str(&status),
                ContentCategory::from_str(&category),
            ) else {
                continue;
            };
            let count = count as u64;
            *counts.by_status.entry(status).or_insert(0) += count;
            *counts
                .by_category
                .entry(category)
                .or_default()
                .entry(status)
                .or_insert(0) += count;
        }
        Ok(counts)
    }

    /// Most frequent error messages among failed items, highest first.
    pub async fn top_errors(&self, limit: usize) -> Result<Vec<(String, u64)>, DieselError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;
        let rows: Vec<(Option<String>, i64)> = work_items::table
            .filter(work_items::status.eq(WorkItemStatus::Error.as_str()))
            .group_by(work_items::error_message)
            .select((work_items::error_message, count_star()))
            .load(&mut conn)
            .await?;

        let mut errors: Vec<(String, u64)> = rows
            .into_iter()
            .map(|(message, count)| (message.unwrap_or_default(), count as u64))
            .collect();
        errors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        errors.truncate(limit);
        Ok(errors)
    }
}
