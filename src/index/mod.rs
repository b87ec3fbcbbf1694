//! Snapshot index download ("index" phase).
//!
//! For each URL pattern, asks the CDX API how many pages the result set
//! has, subtracts the pages already on disk, and fetches the rest with a
//! bounded number of requests in flight. A page that keeps failing is left
//! missing so the next run picks it up.

pub mod files;

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use files::{
    existing_pages, index_summary, list_page_files, page_file_name, pattern_dir,
    safe_pattern_name, write_page_atomic, PatternFiles,
};

use crate::cdx::{parse_num_pages, CdxQuery, INDEX_FIELDS};
use crate::config::Settings;
use crate::http_client::{FetchError, HttpClient};
use crate::rate_limit::RetryPolicy;

/// Errors that stop an index run outright.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] FetchError),
}

/// Outcome for one URL pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternReport {
    pub pattern: String,
    pub total_pages: u32,
    pub already_present: usize,
    pub downloaded: usize,
    /// Pages that answered with an empty body.
    pub empty: usize,
    pub failed: usize,
    /// Set when the page count itself could not be fetched.
    pub error: Option<String>,
}

impl PatternReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.failed == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexReport {
    pub patterns: Vec<PatternReport>,
}

impl IndexReport {
    pub fn downloaded(&self) -> usize {
        self.patterns.iter().map(|p| p.downloaded).sum()
    }

    pub fn failed(&self) -> usize {
        self.patterns.iter().map(|p| p.failed).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.patterns.iter().all(PatternReport::is_complete)
    }
}

/// Paged, resumable CDX index downloader.
pub struct IndexFetcher {
    client: HttpClient,
    cdx_url: String,
    index_dir: PathBuf,
    page_size: u32,
    retry: RetryPolicy,
}

impl IndexFetcher {
    pub fn new(
        client: HttpClient,
        cdx_url: impl Into<String>,
        index_dir: impl Into<PathBuf>,
        page_size: u32,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            cdx_url: cdx_url.into(),
            index_dir: index_dir.into(),
            page_size,
            retry,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, IndexError> {
        let client = HttpClient::builder(Duration::from_secs(settings.index_timeout))
            .user_agent(&settings.user_agent)
            .build()
            .map_err(IndexError::Client)?;
        Ok(Self::new(
            client,
            settings.cdx_url.clone(),
            settings.index_dir.clone(),
            settings.page_size,
            settings.retry_policy(),
        ))
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Download every missing page for every pattern.
    pub async fn download_index(
        &self,
        patterns: &[String],
        concurrency: usize,
    ) -> Result<IndexReport, IndexError> {
        std::fs::create_dir_all(&self.index_dir).map_err(|source| IndexError::Io {
            path: self.index_dir.clone(),
            source,
        })?;

        let mut report = IndexReport::default();
        for pattern in patterns {
            report
                .patterns
                .push(self.download_pattern(pattern, concurrency.max(1)).await);
        }
        Ok(report)
    }

    async fn download_pattern(&self, pattern: &str, concurrency: usize) -> PatternReport {
        let mut report = PatternReport {
            pattern: pattern.to_string(),
            ..Default::default()
        };

        let total_pages = match self.page_count(pattern).await {
            Ok(n) => n,
            Err(e) => {
                warn!("{}: page count failed: {}", pattern, e);
                report.error = Some(e.to_string());
                return report;
            }
        };
        report.total_pages = total_pages;

        let dir = pattern_dir(&self.index_dir, pattern);
        let present = existing_pages(&dir);
        let todo: Vec<u32> = (0..total_pages).filter(|p| !present.contains(p)).collect();
        report.already_present = total_pages as usize - todo.len();
        info!(
            "{}: {} pages, {} already downloaded, {} to fetch",
            pattern,
            total_pages,
            report.already_present,
            todo.len()
        );

        let outcomes: Vec<PageOutcome> = stream::iter(todo)
            .map(|page| {
                let dir = dir.clone();
                async move { self.download_page(pattern, page, &dir).await }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                PageOutcome::Saved => report.downloaded += 1,
                PageOutcome::Empty => report.empty += 1,
                PageOutcome::Failed => report.failed += 1,
            }
        }
        report
    }

    async fn page_count(&self, pattern: &str) -> Result<u32, FetchError> {
        let url = CdxQuery::new(pattern)
            .base_url(&self.cdx_url)
            .filter("statuscode:200")
            .page_size(self.page_size)
            .show_num_pages()
            .build();
        let (client, url) = (&self.client, url.as_str());
        self.retry
            .run(pattern, |_| async move {
                let body = client.get_text(url).await?;
                parse_num_pages(&body).map_err(|e| FetchError::Body(e.to_string()))
            })
            .await
    }

    async fn download_page(&self, pattern: &str, page: u32, dir: &Path) -> PageOutcome {
        let url = CdxQuery::new(pattern)
            .base_url(&self.cdx_url)
            .fields(&INDEX_FIELDS)
            .filter("statuscode:200")
            .page_size(self.page_size)
            .page(page)
            .build();
        let label = format!("{} page {}", pattern, page);

        let (client, url) = (&self.client, url.as_str());
        let body = match self.retry.run(&label, |_| client.get_text(url)).await {
            Ok(body) => body,
            Err(e) => {
                warn!("{}: giving up: {}", label, e);
                return PageOutcome::Failed;
            }
        };

        if body.trim().is_empty() {
            debug!("{}: empty page", label);
            return PageOutcome::Empty;
        }

        let path = dir.join(page_file_name(page));
        let written =
            tokio::task::spawn_blocking(move || write_page_atomic(&path, &body)).await;
        match written {
            Ok(Ok(())) => {
                debug!("{}: saved", label);
                PageOutcome::Saved
            }
            Ok(Err(e)) => {
                warn!("{}: write failed: {}", label, e);
                PageOutcome::Failed
            }
            Err(e) => {
                warn!("{}: write task failed: {}", label, e);
                PageOutcome::Failed
            }
        }
    }
}

enum PageOutcome {
    Saved,
    Empty,
    Failed,
}
