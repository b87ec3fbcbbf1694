//! Work queue construction ("queue" phase).
//!
//! Reads every downloaded index page, keeps content URLs only, collapses
//! them to one entry per canonical URL and diffs the result against the
//! work items already stored. Re-running over the same index data inserts
//! nothing.

mod dedup;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use dedup::{SnapshotDeduper, Skip};

use crate::cdx::parse_index_page;
use crate::classify::Classifier;
use crate::index::list_page_files;
use crate::models::{QueueEntry, WorkItemStatus};
use crate::repository::{DbContext, DieselError};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("no index data under {}; run `index` first", .0.display())]
    NoIndexData(PathBuf),

    #[error("failed to read index data: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid site profile pattern: {0}")]
    Profile(#[from] regex::Error),

    #[error("database error: {0}")]
    Database(#[from] DieselError),

    #[error("index scan aborted: {0}")]
    Aborted(String),
}

/// What a queue build saw and did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueReport {
    pub pages: usize,
    pub malformed_pages: usize,
    pub malformed_rows: usize,
    pub records: usize,
    pub rejected: usize,
    pub non_ok: usize,
    /// Captures superseded by a newer capture of the same URL.
    pub duplicates: usize,
    pub unique_urls: usize,
    pub inserted: usize,
    /// Pending items moved to a newer snapshot.
    pub advanced: usize,
    /// Newly inserted items per category.
    pub by_category: BTreeMap<String, usize>,
}

/// Turns index pages into pending work items.
pub struct QueueBuilder {
    db: DbContext,
    classifier: Classifier,
    index_dir: PathBuf,
}

impl QueueBuilder {
    pub fn new(db: DbContext, classifier: Classifier, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            classifier,
            index_dir: index_dir.into(),
        }
    }

    pub async fn build_queue(&self) -> Result<QueueReport, QueueError> {
        let files = list_page_files(&self.index_dir)?;
        if files.is_empty() {
            return Err(QueueError::NoIndexData(self.index_dir.clone()));
        }
        info!("Scanning {} index pages", files.len());

        let classifier = self.classifier.clone();
        let (mut report, entries) = tokio::task::spawn_blocking(move || scan(&files, classifier))
            .await
            .map_err(|e| QueueError::Aborted(e.to_string()))?;

        let known = self.db.work_items().known_urls().await?;
        let mut fresh: Vec<QueueEntry> = Vec::new();
        let mut newer: Vec<(String, String)> = Vec::new();
        for entry in entries {
            match known.get(&entry.url) {
                None => fresh.push(entry),
                Some(existing)
                    if existing.status == WorkItemStatus::Pending
                        && existing.latest_timestamp < entry.latest_timestamp =>
                {
                    newer.push((entry.url, entry.latest_timestamp));
                }
                Some(_) => {}
            }
        }

        for entry in &fresh {
            *report
                .by_category
                .entry(entry.category.as_str().to_string())
                .or_insert(0) += 1;
        }

        let repo = self.db.work_items();
        report.inserted = repo.insert_new(&fresh).await?;
        report.advanced = repo.advance_timestamps(&newer).await?;

        info!(
            "Queue: {} unique content URLs, {} new, {} advanced",
            report.unique_urls, report.inserted, report.advanced
        );
        Ok(report)
    }
}

fn scan(files: &[PathBuf], classifier: Classifier) -> (QueueReport, Vec<QueueEntry>) {
    let mut report = QueueReport::default();
    let mut deduper = SnapshotDeduper::new(classifier);

    for path in files {
        report.pages += 1;
        let parsed = match read_page(path) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping index page {}: {}", path.display(), e);
                report.malformed_pages += 1;
                continue;
            }
        };
        report.malformed_rows += parsed.malformed;

        for record in &parsed.records {
            report.records += 1;
            match deduper.offer(record) {
                Ok(()) => {}
                Err(Skip::Rejected) => report.rejected += 1,
                Err(Skip::NotOk) => report.non_ok += 1,
                Err(Skip::Older) => {}
            }
        }
        debug!("{}: {} records", path.display(), parsed.records.len());
    }

    if deduper.is_empty() {
        warn!("No content URLs in {} index pages", report.pages);
    }
    report.unique_urls = deduper.len();
    report.duplicates = report.records - report.rejected - report.non_ok - report.unique_urls;
    (report, deduper.into_entries())
}

fn read_page(path: &Path) -> Result<crate::cdx::ParsedPage, String> {
    let body = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    parse_index_page(&body).map_err(|e| e.to_string())
}
