use crate::models::ReviewRecord;
use crate::review::query::{select, ReviewFilter, ReviewStats};

/// Review records held by the caller between queries.
///
/// `records` is `None` until the first load, which keeps "not yet loaded"
/// distinct from "loaded and empty".
#[derive(Debug, Clone, Default)]
pub struct ReviewRecordSet {
    records: Option<Vec<ReviewRecord>>,
    total: u64,
}

impl ReviewRecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.records.is_some()
    }

    /// Install a freshly fetched page. `total` is the backend's match count.
    pub fn replace_all(&mut self, records: Vec<ReviewRecord>, total: u64) {
        self.records = Some(records);
        self.total = total;
    }

    /// Swap in a server-confirmed record by id. Returns whether a record was
    /// replaced; records not currently held are ignored.
    pub fn reconcile(&mut self, updated: &ReviewRecord) -> bool {
        let Some(slot) = self
            .records
            .as_mut()
            .and_then(|records| records.iter_mut().find(|r| r.id == updated.id))
        else {
            return false;
        };
        *slot = updated.clone();
        true
    }

    pub fn find(&self, review_id: &str) -> Option<&ReviewRecord> {
        self.records
            .as_ref()
            .and_then(|records| records.iter().find(|r| r.id == review_id))
    }

    /// `None` while nothing has been loaded.
    pub fn select(&self, filter: &ReviewFilter) -> Option<Vec<ReviewRecord>> {
        self.records
            .as_ref()
            .map(|records| select(records, filter))
    }

    pub fn stats(&self) -> ReviewStats {
        self.records
            .as_deref()
            .map(ReviewStats::from_records)
            .unwrap_or_default()
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}
