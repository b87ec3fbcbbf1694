//! Archived page retrieval.

use std::time::Duration;

use async_trait::async_trait;

use crate::cdx::build_raw_archive_url;
use crate::config::Settings;
use crate::http_client::{FetchError, HttpClient};

/// Where snapshot bodies come from.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// URL recorded as the provenance of a snapshot.
    fn snapshot_url(&self, timestamp: &str, url: &str) -> String;

    /// One attempt at fetching a snapshot body. Retries are the caller's job.
    async fn fetch_snapshot(&self, timestamp: &str, url: &str) -> Result<String, FetchError>;
}

/// Raw-content endpoint of the web archive.
#[derive(Debug, Clone)]
pub struct ArchiveClient {
    client: HttpClient,
    base_url: String,
}

impl ArchiveClient {
    pub fn new(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, FetchError> {
        let client = HttpClient::builder(Duration::from_secs(settings.request_timeout))
            .user_agent(&settings.user_agent)
            .build()?;
        Ok(Self::new(client, settings.archive_url.clone()))
    }
}

#[async_trait]
impl SnapshotSource for ArchiveClient {
    fn snapshot_url(&self, timestamp: &str, url: &str) -> String {
        build_raw_archive_url(&self.base_url, timestamp, url)
    }

    async fn fetch_snapshot(&self, timestamp: &str, url: &str) -> Result<String, FetchError> {
        self.client
            .get_text(&self.snapshot_url(timestamp, url))
            .await
    }
}
