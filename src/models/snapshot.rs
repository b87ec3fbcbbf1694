use serde::{Deserialize, Serialize};

/// One capture listed by the snapshot index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// 14-digit `YYYYMMDDhhmmss` capture time. Lexical order is chronological.
    pub timestamp: String,
    /// URL as it was originally captured.
    pub original_url: String,
    pub status_code: Option<u16>,
    pub mime_type: Option<String>,
}

impl SnapshotRecord {
    pub fn new(timestamp: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            original_url: original_url.into(),
            status_code: None,
            mime_type: None,
        }
    }
}
