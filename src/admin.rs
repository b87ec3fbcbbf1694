//! Operator views over the queue: status, bulk retry and export.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::index::{index_summary, PatternFiles};
use crate::models::WorkItemStatus;
use crate::repository::{DbContext, DieselError, HarvestCounts, EXPORT_HEADER};

const EXPORT_PAGE_SIZE: i64 = 5000;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("database error: {0}")]
    Database(#[from] DieselError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCount {
    pub message: String,
    pub count: u64,
}

/// Snapshot of the pipeline's progress.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStatus {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_category: BTreeMap<String, BTreeMap<String, u64>>,
    pub extracted: HarvestCounts,
    pub events_by_source: BTreeMap<String, u64>,
    pub top_errors: Vec<ErrorCount>,
    pub index: Vec<PatternFiles>,
}

impl QueueStatus {
    pub fn count(&self, status: WorkItemStatus) -> u64 {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}

pub struct QueueAdmin {
    db: DbContext,
    index_dir: PathBuf,
}

impl QueueAdmin {
    pub fn new(db: DbContext, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            index_dir: index_dir.into(),
        }
    }

    pub async fn status(&self, top_n: usize) -> Result<QueueStatus, DieselError> {
        let work_items = self.db.work_items();
        let extracted = self.db.extracted();
        let counts = work_items.counts().await?;

        let by_status = [
            WorkItemStatus::Pending,
            WorkItemStatus::Fetched,
            WorkItemStatus::Error,
        ]
        .into_iter()
        .map(|status| (status.as_str().to_string(), counts.status(status)))
        .collect();

        let by_category = counts
            .by_category
            .iter()
            .map(|(category, statuses)| {
                let statuses = statuses
                    .iter()
                    .map(|(status, n)| (status.as_str().to_string(), *n))
                    .collect();
                (category.as_str().to_string(), statuses)
            })
            .collect();

        let index = match index_summary(&self.index_dir) {
            Ok(index) => index,
            Err(e) => {
                debug!("No index summary for {}: {}", self.index_dir.display(), e);
                Vec::new()
            }
        };

        Ok(QueueStatus {
            total: counts.total(),
            by_status,
            by_category,
            extracted: extracted.counts().await?,
            events_by_source: extracted.events_by_source().await?.into_iter().collect(),
            top_errors: work_items
                .top_errors(top_n)
                .await?
                .into_iter()
                .map(|(message, count)| ErrorCount { message, count })
                .collect(),
            index,
        })
    }

    /// Send failed items under the attempt cap back to pending.
    pub async fn retry(&self, max_attempts: u32) -> Result<usize, DieselError> {
        let reset = self.db.work_items().retry_errors(max_attempts).await?;
        info!(
            "Reset {} failed items to pending (attempts < {})",
            reset, max_attempts
        );
        Ok(reset)
    }

    /// Write every price event joined with its listing metadata as CSV.
    ///
    /// Rows are streamed in pages so the export never holds the whole table.
    pub async fn export(&self, path: &Path) -> Result<usize, ExportError> {
        let io_err = |source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = File::create(path).map_err(io_err)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));
        writer.write_record(EXPORT_HEADER)?;

        let extracted = self.db.extracted();
        let mut after_id = 0;
        let mut written = 0usize;
        loop {
            let rows = extracted.export_page(after_id, EXPORT_PAGE_SIZE).await?;
            let Some(last) = rows.last() else {
                break;
            };
            after_id = last.id;
            for row in &rows {
                writer.serialize(row)?;
            }
            written += rows.len();
            debug!("Exported {} rows so far", written);
        }

        writer.flush().map_err(io_err)?;
        if written == 0 {
            warn!("No price events to export");
        }
        info!("Exported {} rows to {}", written, path.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{page_file_name, pattern_dir, write_page_atomic};
    use crate::models::{ContentCategory, EventType, Harvest, HistoryEvent, ListingFacts, QueueEntry};

    fn entry(url: &str, category: ContentCategory, id: &str) -> QueueEntry {
        QueueEntry {
            url: url.to_string(),
            category,
            external_id: id.to_string(),
            latest_timestamp: "20190101000000".to_string(),
        }
    }

    fn event(date: &str, event_type: EventType, price: f64) -> HistoryEvent {
        HistoryEvent {
            event_date: Some(date.to_string()),
            event_type,
            price: Some(price),
            price_delta: None,
            broker: None,
            description: None,
            source: "embedded_history",
            raw_json: None,
        }
    }

    async fn setup() -> (tempfile::TempDir, QueueAdmin) {
        let dir = tempfile::tempdir().unwrap();
        let db = DbContext::from_path(&dir.path().join("listings.db"));
        db.migrate().await.unwrap();

        let repo = db.work_items();
        repo.insert_new(&[
            entry("https://streeteasy.com/sale/1", ContentCategory::UnitSale, "1"),
            entry("https://streeteasy.com/sale/2", ContentCategory::UnitSale, "2"),
            entry("https://streeteasy.com/rental/3", ContentCategory::UnitRental, "3"),
            entry("https://streeteasy.com/rental/4", ContentCategory::UnitRental, "4"),
        ])
        .await
        .unwrap();

        let first = repo
            .get_by_url("https://streeteasy.com/sale/1")
            .await
            .unwrap()
            .unwrap();
        let harvest = Harvest {
            snapshot_url: "https://web.archive.org/web/20190101000000id_/https://streeteasy.com/sale/1"
                .to_string(),
            metadata: Some(ListingFacts {
                price: Some(950_000.0),
                beds: Some(2),
                address: Some("1 Main St #4B".to_string()),
                ..Default::default()
            }),
            events: vec![
                event("2018-03-01", EventType::Listed, 1_000_000.0),
                event("2018-06-01", EventType::PriceChange, 950_000.0),
            ],
            child_urls: Vec::new(),
        };
        assert!(repo.record_success(&first, &harvest).await.unwrap());

        for url in ["https://streeteasy.com/sale/2", "https://streeteasy.com/rental/3"] {
            let item = repo.get_by_url(url).await.unwrap().unwrap();
            assert!(repo.record_failure(item.id, "not_found").await.unwrap());
        }

        let admin = QueueAdmin::new(db, dir.path().join("index"));
        (dir, admin)
    }

    #[tokio::test]
    async fn test_status_counts() {
        let (dir, admin) = setup().await;
        write_page_atomic(
            &pattern_dir(&dir.path().join("index"), "streeteasy.com/sale/*").join(page_file_name(0)),
            "[]",
        )
        .unwrap();

        let status = admin.status(10).await.unwrap();
        assert_eq!(status.total, 4);
        assert_eq!(status.count(WorkItemStatus::Fetched), 1);
        assert_eq!(status.count(WorkItemStatus::Error), 2);
        assert_eq!(status.count(WorkItemStatus::Pending), 1);
        assert_eq!(status.by_category["unit_rental"]["error"], 1);
        assert_eq!(status.extracted.metadata, 1);
        assert_eq!(status.extracted.price_events, 2);
        assert_eq!(status.events_by_source.get("embedded_history"), Some(&2));
        assert_eq!(
            status.top_errors,
            vec![ErrorCount {
                message: "not_found".to_string(),
                count: 2
            }]
        );
        assert_eq!(status.index.len(), 1);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["by_status"]["fetched"], 1);
    }

    #[tokio::test]
    async fn test_status_without_index_dir() {
        let (_dir, admin) = setup().await;
        let status = admin.status(10).await.unwrap();
        assert!(status.index.is_empty());
    }

    #[tokio::test]
    async fn test_retry_respects_attempt_cap() {
        let (_dir, admin) = setup().await;
        assert_eq!(admin.retry(1).await.unwrap(), 0);
        assert_eq!(admin.retry(3).await.unwrap(), 2);

        let status = admin.status(10).await.unwrap();
        assert_eq!(status.count(WorkItemStatus::Pending), 3);
        assert_eq!(status.count(WorkItemStatus::Error), 0);
    }

    #[tokio::test]
    async fn test_export_csv() {
        let (dir, admin) = setup().await;
        let path = dir.path().join("out").join("events.csv");
        assert_eq!(admin.export(&path).await.unwrap(), 2);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), EXPORT_HEADER.len());
        assert_eq!(&headers[0], "url");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "https://streeteasy.com/sale/1");
        assert_eq!(&rows[0][3], "listed");
        assert_eq!(&rows[1][3], "price_change");
        assert_eq!(&rows[1][9], "2");
        assert_eq!(&rows[1][12], "1 Main St #4B");
    }
}
