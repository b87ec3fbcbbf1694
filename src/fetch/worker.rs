//! One fetch worker: a sequential loop over its share of the queue.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::reporter::FetchCounters;
use super::{FetchEvent, SnapshotSource};
use crate::extract::{ExtractError, Extractor};
use crate::models::{Harvest, WorkItem};
use crate::rate_limit::{RateLimiter, RetryPolicy};
use crate::repository::WorkItemRepository;

/// Everything a worker shares with its siblings.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub repo: WorkItemRepository,
    pub source: Arc<dyn SnapshotSource>,
    pub extractor: Arc<Extractor>,
    pub limiter: Arc<RateLimiter>,
    pub retry: RetryPolicy,
    pub counters: Arc<FetchCounters>,
    pub events: Option<mpsc::Sender<FetchEvent>>,
}

impl WorkerContext {
    async fn emit(&self, event: FetchEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event).await;
        }
    }

    /// Process assigned items in order. Never returns early on item errors.
    pub async fn run(self, worker_id: usize, items: Vec<WorkItem>) {
        debug!("worker {} starting with {} items", worker_id, items.len());
        for item in items {
            self.emit(FetchEvent::Started {
                worker_id,
                url: item.url.clone(),
            })
            .await;
            self.process(worker_id, &item).await;
        }
        debug!("worker {} drained", worker_id);
    }

    async fn process(&self, worker_id: usize, item: &WorkItem) {
        let body = match self.fetch(item).await {
            Ok(body) => body,
            Err(message) => return self.fail(worker_id, item, &message).await,
        };

        let harvest = match self.extract(item, body).await {
            Ok(harvest) => harvest,
            Err(e) => return self.fail(worker_id, item, &e.to_string()).await,
        };

        match self.repo.record_success(item, &harvest).await {
            Ok(true) => {
                self.counters.fetched.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .events
                    .fetch_add(harvest.events.len(), Ordering::Relaxed);
                self.emit(FetchEvent::Fetched {
                    worker_id,
                    url: item.url.clone(),
                    events: harvest.events.len(),
                    metadata: harvest.metadata.is_some(),
                })
                .await;
            }
            Ok(false) => self.skip(worker_id, item).await,
            Err(e) => self.fail(worker_id, item, &format!("persist: {}", e)).await,
        }
    }

    /// Rate-limited fetch with retries; the limiter gates every attempt.
    async fn fetch(&self, item: &WorkItem) -> Result<String, String> {
        let (limiter, source) = (&self.limiter, &self.source);
        let (timestamp, url) = (item.latest_timestamp.as_str(), item.url.as_str());
        self.retry
            .run(url, |_| async move {
                limiter.acquire().await;
                source.fetch_snapshot(timestamp, url).await
            })
            .await
            .map_err(|e| e.to_string())
    }

    /// Extraction is CPU-bound; keep it off the async workers.
    async fn extract(&self, item: &WorkItem, body: String) -> Result<Harvest, ExtractError> {
        let extractor = self.extractor.clone();
        let snapshot_url = self.source.snapshot_url(&item.latest_timestamp, &item.url);
        let url = item.url.clone();
        let category = item.category;
        tokio::task::spawn_blocking(move || {
            extractor.harvest(&body, &url, category, &snapshot_url)
        })
        .await
        .map_err(|e| ExtractError::Aborted(e.to_string()))
    }

    async fn fail(&self, worker_id: usize, item: &WorkItem, message: &str) {
        warn!("{}: {}", item.url, message);
        match self.repo.record_failure(item.id, message).await {
            Ok(true) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.emit(FetchEvent::Failed {
                    worker_id,
                    url: item.url.clone(),
                    error: message.to_string(),
                })
                .await;
            }
            Ok(false) => self.skip(worker_id, item).await,
            Err(e) => {
                // Item stays pending and is picked up by the next run.
                error!("{}: could not record failure: {}", item.url, e);
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.emit(FetchEvent::Failed {
                    worker_id,
                    url: item.url.clone(),
                    error: message.to_string(),
                })
                .await;
            }
        }
    }

    async fn skip(&self, worker_id: usize, item: &WorkItem) {
        debug!("{}: no longer pending, skipped", item.url);
        self.counters.skipped.fetch_add(1, Ordering::Relaxed);
        self.emit(FetchEvent::Skipped {
            worker_id,
            url: item.url.clone(),
        })
        .await;
    }
}
