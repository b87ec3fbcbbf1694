//! Latest-snapshot-wins deduplication.

use std::collections::HashMap;

use crate::classify::{canonicalize, Classifier};
use crate::models::{QueueEntry, SnapshotRecord};

/// Why a snapshot record did not make it into the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// Not a content page.
    Rejected,
    /// Captured with a non-200 status.
    NotOk,
    /// Same URL as a newer (or equal) capture already seen.
    Older,
}

/// Collapses snapshot records to one entry per canonical URL, keeping the
/// greatest timestamp. Capture timestamps are fixed-width digit strings, so
/// string order is time order.
#[derive(Debug)]
pub struct SnapshotDeduper {
    classifier: Classifier,
    latest: HashMap<String, QueueEntry>,
}

impl SnapshotDeduper {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            classifier,
            latest: HashMap::new(),
        }
    }

    pub fn offer(&mut self, record: &SnapshotRecord) -> Result<(), Skip> {
        if record.status_code.is_some_and(|code| code != 200) {
            return Err(Skip::NotOk);
        }
        let classified = self
            .classifier
            .classify(&record.original_url)
            .ok_or(Skip::Rejected)?;
        let url = canonicalize(&record.original_url);

        match self.latest.get_mut(&url) {
            Some(existing) if existing.latest_timestamp >= record.timestamp => Err(Skip::Older),
            Some(existing) => {
                existing.latest_timestamp = record.timestamp.clone();
                Ok(())
            }
            None => {
                self.latest.insert(
                    url.clone(),
                    QueueEntry {
                        url,
                        category: classified.category,
                        external_id: classified.external_id,
                        latest_timestamp: record.timestamp.clone(),
                    },
                );
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    /// Entries sorted by URL, so inserts happen in a stable order.
    pub fn into_entries(self) -> Vec<QueueEntry> {
        let mut entries: Vec<_> = self.latest.into_values().collect();
        entries.sort_by(|a, b| a.url.cmp(&b.url));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteProfile;
    use crate::models::ContentCategory;

    fn deduper() -> SnapshotDeduper {
        SnapshotDeduper::new(Classifier::new(&SiteProfile::default()).unwrap())
    }

    #[test]
    fn test_latest_timestamp_wins_in_either_order() {
        let older = SnapshotRecord::new("20180101000000", "http://streeteasy.com/sale/1/");
        let newer = SnapshotRecord::new("20190101000000", "https://streeteasy.com/sale/1");

        for order in [[&older, &newer], [&newer, &older]] {
            let mut d = deduper();
            for record in order {
                let _ = d.offer(record);
            }
            let entries = d.into_entries();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].url, "https://streeteasy.com/sale/1");
            assert_eq!(entries[0].latest_timestamp, "20190101000000");
            assert_eq!(entries[0].category, ContentCategory::UnitSale);
            assert_eq!(entries[0].external_id, "1");
        }
    }

    #[test]
    fn test_skips() {
        let mut d = deduper();
        assert_eq!(
            d.offer(&SnapshotRecord::new("20190101000000", "https://streeteasy.com/search")),
            Err(Skip::Rejected)
        );
        let mut redirect = SnapshotRecord::new("20190101000000", "https://streeteasy.com/sale/2");
        redirect.status_code = Some(301);
        assert_eq!(d.offer(&redirect), Err(Skip::NotOk));

        let ok = SnapshotRecord::new("20190101000000", "https://streeteasy.com/sale/2");
        assert_eq!(d.offer(&ok), Ok(()));
        assert_eq!(d.offer(&ok), Err(Skip::Older));
        assert_eq!(d.len(), 1);
    }
}
