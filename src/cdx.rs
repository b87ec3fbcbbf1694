//! Wayback Machine CDX API utilities.
//!
//! URL construction for paged index queries, parsing of index pages in the
//! formats the API (and older dumps of it) produce, and archive URL helpers.

use std::collections::HashMap;
use std::fmt;

use crate::models::SnapshotRecord;

/// Wayback Machine CDX API base URL.
pub const WAYBACK_CDX_API_URL: &str = "https://web.archive.org/cdx/search/cdx";

/// Base for raw archived content.
pub const WAYBACK_CONTENT_URL: &str = "https://web.archive.org/web";

/// Fields requested for every index page.
pub const INDEX_FIELDS: [&str; 5] = ["timestamp", "original", "statuscode", "mimetype", "length"];

/// Builder for CDX API query URLs.
pub struct CdxQuery {
    base_url: String,
    url_pattern: String,
    fields: Vec<String>,
    filters: Vec<String>,
    page: Option<u32>,
    page_size: Option<u32>,
    show_num_pages: bool,
}

impl CdxQuery {
    /// Create a new query for the given URL pattern.
    pub fn new(url_pattern: impl Into<String>) -> Self {
        Self {
            base_url: WAYBACK_CDX_API_URL.to_string(),
            url_pattern: url_pattern.into(),
            fields: Vec::new(),
            filters: Vec::new(),
            page: None,
            page_size: None,
            show_num_pages: false,
        }
    }

    /// Override the CDX API base URL (for testing or alternative instances).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the fields to return (`fl=` parameter).
    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Append a filter (`filter=` parameter). Can be called multiple times.
    pub fn filter(mut self, f: impl Into<String>) -> Self {
        self.filters.push(f.into());
        self
    }

    /// Request one page of a paged result set.
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Rows per page (`pageSize=`); the API counts this in index blocks.
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Ask for the number of pages instead of rows.
    pub fn show_num_pages(mut self) -> Self {
        self.show_num_pages = true;
        self
    }

    /// Build the final CDX API URL.
    pub fn build(&self) -> String {
        // Encode the URL pattern but preserve CDX wildcard characters (*).
        let encoded_pattern = urlencoding::encode(&self.url_pattern).replace("%2A", "*");
        let mut url = format!("{}?url={}", self.base_url, encoded_pattern);

        if self.show_num_pages {
            url.push_str("&showNumPages=true");
        } else {
            url.push_str("&output=json");
        }
        if !self.fields.is_empty() {
            url.push_str(&format!("&fl={}", self.fields.join(",")));
        }
        for f in &self.filters {
            url.push_str(&format!("&filter={}", f));
        }
        if let Some(size) = self.page_size {
            url.push_str(&format!("&pageSize={}", size));
        }
        if let Some(page) = self.page {
            url.push_str(&format!("&page={}", page));
        }

        url
    }
}

/// Errors from CDX response parsing.
#[derive(Debug, PartialEq)]
pub enum CdxParseError {
    /// Response body was empty or whitespace-only.
    Empty,
    /// JSON deserialization failed.
    Json(String),
    /// Page-count response was not an integer.
    PageCount(String),
}

impl fmt::Display for CdxParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty CDX response"),
            Self::Json(msg) => write!(f, "Failed to parse CDX JSON: {}", msg),
            Self::PageCount(body) => write!(f, "Unexpected page count response: {:?}", body),
        }
    }
}

impl std::error::Error for CdxParseError {}

/// Parse the body of a `showNumPages=true` request.
pub fn parse_num_pages(body: &str) -> Result<u32, CdxParseError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(CdxParseError::Empty);
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| CdxParseError::PageCount(trimmed.chars().take(80).collect()))
}

/// Records recovered from one index page.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedPage {
    pub records: Vec<SnapshotRecord>,
    /// Rows that were present but unusable.
    pub malformed: usize,
}

/// A single row from a CDX JSON response with named field access.
#[derive(Debug, Clone)]
struct CdxRow {
    fields: HashMap<String, String>,
}

impl CdxRow {
    /// Returns `None` for missing fields and CDX null markers (`"-"`).
    fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(|s| s.as_str())
            .filter(|s| *s != "-")
    }

    fn into_record(self) -> Option<SnapshotRecord> {
        let timestamp = self.get("timestamp").filter(|ts| is_valid_timestamp(ts))?;
        let original = self.get("original").filter(|u| !u.trim().is_empty())?;
        Some(SnapshotRecord {
            timestamp: timestamp.to_string(),
            original_url: original.trim().to_string(),
            status_code: self.get("statuscode").and_then(|s| s.parse().ok()),
            mime_type: self.get("mimetype").map(str::to_string),
        })
    }
}

/// True for a 14-digit `YYYYMMDDhhmmss` capture timestamp.
pub fn is_valid_timestamp(ts: &str) -> bool {
    ts.len() == 14 && ts.bytes().all(|b| b.is_ascii_digit())
}

/// Parse one stored index page.
///
/// Accepts a JSON array whose first row names the columns, newline-delimited
/// JSON objects, or whitespace-separated `timestamp original ...` lines.
/// Unusable rows are counted in [`ParsedPage::malformed`]; only a page that
/// is not parseable at all is an error.
pub fn parse_index_page(body: &str) -> Result<ParsedPage, CdxParseError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(ParsedPage::default());
    }
    if trimmed.starts_with('[') {
        parse_json_table(trimmed)
    } else {
        Ok(parse_lines(trimmed))
    }
}

fn parse_json_table(body: &str) -> Result<ParsedPage, CdxParseError> {
    let rows: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| CdxParseError::Json(e.to_string()))?;

    let mut page = ParsedPage::default();
    let mut rows = rows.into_iter();

    // A header row names the columns; without one, fall back to the
    // default `timestamp, original, ...` order.
    let first = rows.next();
    let headers: Vec<String> = match first.as_ref().and_then(string_row) {
        Some(names) if names.iter().any(|n| n == "timestamp" || n == "original") => names,
        _ => INDEX_FIELDS.iter().map(|s| s.to_string()).collect(),
    };
    let leftover = first.filter(|row| string_row(row).map(|r| r != headers).unwrap_or(true));

    for row in leftover.into_iter().chain(rows) {
        let record = string_row(&row).and_then(|values| {
            let fields = headers.iter().cloned().zip(values).collect();
            CdxRow { fields }.into_record()
        });
        match record {
            Some(record) => page.records.push(record),
            None => page.malformed += 1,
        }
    }
    Ok(page)
}

fn string_row(value: &serde_json::Value) -> Option<Vec<String>> {
    value.as_array().map(|cells| {
        cells
            .iter()
            .map(|cell| match cell {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    })
}

fn parse_lines(body: &str) -> ParsedPage {
    let mut page = ParsedPage::default();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let record = if line.starts_with('{') {
            serde_json::from_str::<HashMap<String, serde_json::Value>>(line)
                .ok()
                .and_then(|obj| {
                    let fields = obj
                        .into_iter()
                        .map(|(k, v)| {
                            let v = match v {
                                serde_json::Value::String(s) => s,
                                other => other.to_string(),
                            };
                            (k, v)
                        })
                        .collect();
                    CdxRow { fields }.into_record()
                })
        } else {
            let fields = INDEX_FIELDS
                .iter()
                .map(|s| s.to_string())
                .zip(line.split_whitespace().map(str::to_string))
                .collect();
            CdxRow { fields }.into_record()
        };
        match record {
            Some(record) => page.records.push(record),
            None => page.malformed += 1,
        }
    }
    page
}

/// Build a raw archive URL (without toolbar/frame) under the given base.
pub fn build_raw_archive_url(base: &str, timestamp: &str, original_url: &str) -> String {
    format!(
        "{}/{}id_/{}",
        base.trim_end_matches('/'),
        timestamp,
        original_url
    )
}
