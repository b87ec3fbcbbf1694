//! Snapshot fetch and extraction ("fetch" phase).
//!
//! Pending work items are claimed once up front and dealt round-robin to a
//! fixed set of workers, so no item is handled twice within a run. Every
//! request goes through one shared [`RateLimiter`]. Each item's data and its
//! status change are written in a single transaction; killing the process
//! at any point leaves at most the in-flight items pending for the next run.
//!
//! Emits [`FetchEvent`]s for progress tracking and leaves rendering to the
//! caller.

mod archive;
mod reporter;
mod worker;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

pub use archive::{ArchiveClient, SnapshotSource};
pub use reporter::{eta, FetchCounters, ProgressReporter};

use crate::config::Settings;
use crate::extract::Extractor;
use crate::models::{ContentCategory, WorkItem};
use crate::rate_limit::{RateLimitError, RateLimiter, RetryPolicy};
use crate::repository::{DbContext, DieselError};
use worker::WorkerContext;

/// Progress notifications from the workers.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    /// Claimed items are about to be processed.
    Claimed { total: usize },
    Started { worker_id: usize, url: String },
    Fetched {
        worker_id: usize,
        url: String,
        events: usize,
        metadata: bool,
    },
    Failed {
        worker_id: usize,
        url: String,
        error: String,
    },
    /// The item was no longer pending when its result was written.
    Skipped { worker_id: usize, url: String },
}

/// Setup failures; per-item problems never surface here.
#[derive(Debug, Error)]
pub enum FetchRunError {
    #[error(transparent)]
    Rate(#[from] RateLimitError),

    #[error("database error: {0}")]
    Database(#[from] DieselError),
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub concurrency: usize,
    /// Aggregate requests per second across all workers.
    pub rate: f64,
    pub limit: Option<usize>,
    pub category: Option<ContentCategory>,
    pub report_interval: Duration,
}

impl FetchOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            concurrency: settings.fetch_concurrency,
            rate: settings.requests_per_second,
            limit: None,
            category: None,
            report_interval: Duration::from_secs(settings.report_interval),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchSummary {
    pub claimed: usize,
    pub fetched: usize,
    pub failed: usize,
    pub skipped: usize,
    pub events: usize,
    pub elapsed_secs: f64,
}

/// Deal items round-robin into `workers` lists, keeping queue order within each.
pub fn partition(items: Vec<WorkItem>, workers: usize) -> Vec<Vec<WorkItem>> {
    let workers = workers.max(1);
    let mut shares: Vec<Vec<WorkItem>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, item) in items.into_iter().enumerate() {
        shares[i % workers].push(item);
    }
    shares.retain(|share| !share.is_empty());
    shares
}

/// Bounded pool of fetch workers.
pub struct FetchWorkerPool {
    db: DbContext,
    source: Arc<dyn SnapshotSource>,
    extractor: Arc<Extractor>,
    retry: RetryPolicy,
}

impl FetchWorkerPool {
    pub fn new(
        db: DbContext,
        source: Arc<dyn SnapshotSource>,
        extractor: Arc<Extractor>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            db,
            source,
            extractor,
            retry,
        }
    }

    /// Process pending items until the claimed set is drained.
    pub async fn run(
        &self,
        options: FetchOptions,
        events: Option<mpsc::Sender<FetchEvent>>,
    ) -> Result<FetchSummary, FetchRunError> {
        let limiter = Arc::new(RateLimiter::new(options.rate)?);
        let items = self
            .db
            .work_items()
            .pending(options.limit, options.category)
            .await?;
        let claimed = items.len();
        info!(
            "Claimed {} pending items for {} workers at {} req/s",
            claimed, options.concurrency, options.rate
        );
        if let Some(ref tx) = events {
            let _ = tx.send(FetchEvent::Claimed { total: claimed }).await;
        }

        let started = Instant::now();
        let counters = Arc::new(FetchCounters::default());
        let (stop_tx, stop_rx) = watch::channel(false);
        let reporter = ProgressReporter::new(counters.clone(), claimed, options.report_interval)
            .spawn(stop_rx);

        let ctx = WorkerContext {
            repo: self.db.work_items(),
            source: self.source.clone(),
            extractor: self.extractor.clone(),
            limiter,
            retry: self.retry.clone(),
            counters: counters.clone(),
            events,
        };

        let handles: Vec<_> = partition(items, options.concurrency)
            .into_iter()
            .enumerate()
            .map(|(worker_id, share)| tokio::spawn(ctx.clone().run(worker_id, share)))
            .collect();
        drop(ctx);

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("fetch worker ended abnormally: {}", e);
            }
        }

        let _ = stop_tx.send(true);
        let _ = reporter.await;

        let summary = FetchSummary {
            claimed,
            fetched: counters.fetched.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            skipped: counters.skipped.load(Ordering::Relaxed),
            events: counters.events.load(Ordering::Relaxed),
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        info!(
            "Fetch finished: {} fetched, {} failed, {} skipped, {} events in {:.1}s",
            summary.fetched, summary.failed, summary.skipped, summary.events, summary.elapsed_secs
        );
        Ok(summary)
    }
}
