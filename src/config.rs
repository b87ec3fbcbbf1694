//! Configuration management for listing-history using the prefer crate.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cdx::{WAYBACK_CDX_API_URL, WAYBACK_CONTENT_URL};
use crate::http_client::USER_AGENT;
use crate::rate_limit::RetryPolicy;
use crate::repository::DbContext;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "listings.db";

/// Index pages subdirectory name.
const INDEX_SUBDIR: &str = "index";

/// Config file basename discovered by prefer.
const CONFIG_NAME: &str = "listing-history";

/// Which URLs on the target site are worth harvesting, and how to read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, prefer::FromValue)]
#[serde(default)]
pub struct SiteProfile {
    /// Site host without `www.`.
    #[prefer(default)]
    pub host: String,
    /// Index URL patterns; `*` is the archive's prefix wildcard.
    #[prefer(default)]
    pub index_patterns: Vec<String>,
    /// A URL containing any of these (case-insensitive) is never content.
    #[prefer(default)]
    pub rejected_substrings: Vec<String>,
    /// Path segment for for-sale unit pages.
    #[prefer(default)]
    pub sale_segment: String,
    /// Path segment for rental unit pages.
    #[prefer(default)]
    pub rental_segment: String,
    /// Path segment for building pages.
    #[prefer(default)]
    pub aggregate_segment: String,
    /// Building slugs that are really site sections.
    #[prefer(default)]
    pub reserved_slugs: Vec<String>,
}

impl Default for SiteProfile {
    fn default() -> Self {
        let host = "streeteasy.com".to_string();
        Self {
            index_patterns: ["building", "rental", "sale"]
                .iter()
                .map(|segment| format!("{}/{}/*", host, segment))
                .collect(),
            host,
            rejected_substrings: [
                "/search",
                "/for-sale",
                "/for-rent",
                "/neighborhoods",
                "/no-fee",
                "/agents",
                "/login",
                "/signup",
                "/blog",
                "/sitemap",
                "?",
                "/amenity/",
                "/reviews",
                "/floorplans",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            sale_segment: "sale".to_string(),
            rental_segment: "rental".to_string(),
            aggregate_segment: "building".to_string(),
            reserved_slugs: ["search", "no-fee", "featured"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    pub database_url: Option<String>,
    /// Where raw index pages are stored.
    pub index_dir: PathBuf,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Snapshot content request timeout in seconds.
    pub request_timeout: u64,
    /// Index page request timeout in seconds.
    pub index_timeout: u64,
    /// CDX API endpoint.
    pub cdx_url: String,
    /// Base for raw archived content.
    pub archive_url: String,
    /// Rows requested per index page.
    pub page_size: u32,
    pub index_concurrency: usize,
    pub fetch_concurrency: usize,
    /// Aggregate snapshot request ceiling.
    pub requests_per_second: f64,
    /// Attempts per request, and the `retry` cut-off for failed items.
    pub max_attempts: u32,
    pub retry_base_ms: u64,
    pub throttle_base_ms: u64,
    /// Seconds between progress reports during a fetch run.
    pub report_interval: u64,
    pub site: SiteProfile,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            index_dir: data_dir.join(INDEX_SUBDIR),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            user_agent: USER_AGENT.to_string(),
            request_timeout: 60,
            index_timeout: 120,
            cdx_url: WAYBACK_CDX_API_URL.to_string(),
            archive_url: WAYBACK_CONTENT_URL.to_string(),
            page_size: 50_000,
            index_concurrency: 5,
            fetch_concurrency: 10,
            requests_per_second: 8.0,
            max_attempts: 3,
            retry_base_ms: 3_000,
            throttle_base_ms: 5_000,
            report_interval: 5,
            site: SiteProfile::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            index_dir: data_dir.join(INDEX_SUBDIR),
            data_dir,
            ..Default::default()
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            format!("sqlite:{}", self.database_path().display())
        }
    }

    /// Get the full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (label, dir) in [("data", &self.data_dir), ("index", &self.index_dir)] {
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        label,
                        dir.display(),
                        e
                    ),
                )
            })?;
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_base_ms),
            throttle_delay: Duration::from_millis(self.throttle_base_ms),
        }
    }

    /// Create a database context using the configured database URL or path.
    pub fn create_db_context(&self) -> DbContext {
        DbContext::from_url(&self.database_url())
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Index page directory (defaults to `<data_dir>/index`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_dir: Option<String>,
    /// User agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Snapshot request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Index request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdx_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_concurrency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_concurrency: Option<u32>,
    /// Whole requests per second; the `--rate` flag accepts fractions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_second: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_base_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_base_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_interval: Option<u64>,
    /// Target site profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<SiteProfile>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    #[prefer(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers listing-history config files in standard locations.
    pub async fn load() -> Self {
        // Use prefer for file discovery, then parse with serde
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await.unwrap_or_else(|e| {
                    tracing::warn!("{}", e);
                    Self::default()
                }),
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        resolve_path(path_str, base_dir)
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically config file dir or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.index_dir = settings.data_dir.join(INDEX_SUBDIR);
        }
        if let Some(ref index_dir) = self.index_dir {
            settings.index_dir = self.resolve_path(index_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(timeout) = self.index_timeout {
            settings.index_timeout = timeout;
        }
        if let Some(ref url) = self.cdx_url {
            settings.cdx_url = url.clone();
        }
        if let Some(ref url) = self.archive_url {
            settings.archive_url = url.clone();
        }
        if let Some(size) = self.page_size {
            settings.page_size = size;
        }
        if let Some(n) = self.index_concurrency {
            settings.index_concurrency = n as usize;
        }
        if let Some(n) = self.fetch_concurrency {
            settings.fetch_concurrency = n as usize;
        }
        if let Some(rate) = self.requests_per_second {
            settings.requests_per_second = rate as f64;
        }
        if let Some(n) = self.max_attempts {
            settings.max_attempts = n;
        }
        if let Some(ms) = self.retry_base_ms {
            settings.retry_base_ms = ms;
        }
        if let Some(ms) = self.throttle_base_ms {
            settings.throttle_base_ms = ms;
        }
        if let Some(secs) = self.report_interval {
            settings.report_interval = secs;
        }
        if let Some(ref site) = self.site {
            settings.site = site.clone();
        }
    }
}

/// Resolve a path: absolute paths as-is, `~` expanded, relative joined to `base_dir`.
fn resolve_path(path_str: &str, base_dir: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(path_str);
    let path = Path::new(expanded.as_ref());

    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory (--data flag).
    pub data: Option<PathBuf>,
}

/// Look for a config file inside the data directory.
fn find_config_in_data_dir(data_dir: &Path) -> Option<PathBuf> {
    ["toml", "yaml", "yml", "json"]
        .iter()
        .map(|ext| data_dir.join(format!("{}.{}", CONFIG_NAME, ext)))
        .find(|path| path.exists())
}

/// Load config from file sources.
async fn load_file_config(options: &LoadOptions, data_dir_override: Option<&Path>) -> Config {
    // Priority 1: Explicit --config flag
    if let Some(ref config_path) = options.config_path {
        return Config::load_from_path(config_path)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("{}; using defaults", e);
                Config::default()
            });
    }

    // Priority 2: Config inside the data dir
    if let Some(data_dir) = data_dir_override {
        if let Some(config_path) = find_config_in_data_dir(data_dir) {
            tracing::debug!("Found config in data dir: {}", config_path.display());
            return Config::load_from_path(&config_path)
                .await
                .unwrap_or_else(|_| Config::default());
        }
    }

    // Priority 3: Auto-discover via prefer
    Config::load().await
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    // --data beats LISTING_HISTORY_DATA_DIR; both beat the config file.
    let data_dir_override = options
        .data
        .as_ref()
        .map(|d| resolve_path(&d.display().to_string(), &cwd))
        .or_else(|| non_empty_env("LISTING_HISTORY_DATA_DIR").map(|d| resolve_path(&d, &cwd)));

    let config = load_file_config(&options, data_dir_override.as_deref()).await;

    let mut settings = Settings::default();
    let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(data_dir) = data_dir_override {
        if config.index_dir.is_none() {
            settings.index_dir = data_dir.join(INDEX_SUBDIR);
        }
        settings.data_dir = data_dir;
    }

    // DATABASE_URL environment variable takes highest precedence
    if let Some(database_url) = non_empty_env("DATABASE_URL") {
        tracing::debug!("Using DATABASE_URL from environment: {}", database_url);
        settings.database_url = Some(database_url);
    }

    (settings, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_site_profile() {
        let site = SiteProfile::default();
        assert_eq!(
            site.index_patterns,
            vec![
                "streeteasy.com/building/*",
                "streeteasy.com/rental/*",
                "streeteasy.com/sale/*"
            ]
        );
        assert!(site.rejected_substrings.iter().any(|s| s == "/search"));
    }

    #[test]
    fn test_database_url_from_data_dir() {
        let settings = Settings::with_data_dir(PathBuf::from("/tmp/lh"));
        assert_eq!(settings.database_url(), "sqlite:/tmp/lh/listings.db");
        assert_eq!(settings.index_dir, PathBuf::from("/tmp/lh/index"));
    }

    #[tokio::test]
    async fn test_load_toml_and_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listing-history.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "harvest"
fetch_concurrency = 4
requests_per_second = 2

[site]
host = "example.com"
index_patterns = ["example.com/sale/*"]
sale_segment = "sale"
rental_segment = "rental"
aggregate_segment = "building"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, &config.base_dir().unwrap());

        assert_eq!(settings.data_dir, dir.path().join("harvest"));
        assert_eq!(settings.index_dir, dir.path().join("harvest").join("index"));
        assert_eq!(settings.fetch_concurrency, 4);
        assert_eq!(settings.requests_per_second, 2.0);
        assert_eq!(settings.site.host, "example.com");
        // Unspecified profile lists fall back to defaults.
        assert!(settings.site.reserved_slugs.contains(&"search".to_string()));
    }

    #[tokio::test]
    async fn test_load_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listing-history.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(Config::load_from_path(&path).await.is_err());
    }
}
