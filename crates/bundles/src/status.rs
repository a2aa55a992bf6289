use ario_gateway_primitives::Id;
use serde::{Deserialize, Serialize};

/// Bundle lifecycle state (spec §4.5):
/// `New -> Queued -> Downloading -> Unbundling -> Indexed`, with
/// `Downloading`/`Unbundling` able to fall to `Skipped` or `Failed`, and
/// `Failed` retried back to `Queued` up to `max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    New,
    Queued,
    Downloading,
    Unbundling,
    Indexed,
    Skipped,
    Failed,
}

impl BundleStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Unbundling => "unbundling",
            Self::Indexed => "indexed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// One row of the bundles table (spec §4.5): lifecycle state plus the
/// lifecycle timestamps and counters the repair worker and the admin
/// `bundle-status` endpoint read back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct BundleRecord {
    pub id: Id,
    pub root_transaction_id: Id,
    pub status: BundleStatus,
    pub first_queued_at: Option<i64>,
    pub last_queued_at: Option<i64>,
    pub first_skipped_at: Option<i64>,
    pub first_unbundled_at: Option<i64>,
    pub first_fully_indexed_at: Option<i64>,
    pub import_attempt_count: u32,
    pub matched_data_item_count: u64,
    pub data_item_count: u64,
    pub verification_failure_count: u32,
    pub last_status_change_at: i64,
    /// Trusted `data_root` from the chain indexer for this bundle's own L1
    /// anchor transaction, handed in at admission time alongside
    /// `root_transaction_id`. `None` for nested bundles, which have no
    /// independent on-chain anchor and are verified transitively through
    /// their ancestor (spec §4.6).
    pub data_root_trusted: Option<[u8; 32]>,
    pub verified: bool,
}

impl BundleRecord {
    #[must_use]
    pub fn new(id: Id, root_transaction_id: Id, now: i64) -> Self {
        Self {
            id,
            root_transaction_id,
            status: BundleStatus::New,
            first_queued_at: None,
            last_queued_at: None,
            first_skipped_at: None,
            first_unbundled_at: None,
            first_fully_indexed_at: None,
            import_attempt_count: 0,
            matched_data_item_count: 0,
            data_item_count: 0,
            verification_failure_count: 0,
            last_status_change_at: now,
            data_root_trusted: None,
            verified: false,
        }
    }

    /// Moves to `status`, stamping the matching `first_*` timestamp the
    /// first time that state is entered and always refreshing
    /// `last_status_change_at` (spec §4.5's event/timestamp list).
    pub fn transition(&mut self, status: BundleStatus, now: i64) {
        match status {
            BundleStatus::Queued => {
                self.first_queued_at.get_or_insert(now);
                self.last_queued_at = Some(now);
            }
            BundleStatus::Skipped => {
                self.first_skipped_at.get_or_insert(now);
            }
            BundleStatus::Unbundling => {
                self.first_unbundled_at.get_or_insert(now);
            }
            BundleStatus::Indexed => {
                self.first_fully_indexed_at.get_or_insert(now);
            }
            BundleStatus::Downloading | BundleStatus::New | BundleStatus::Failed => {}
        }
        self.status = status;
        self.last_status_change_at = now;
    }

    #[must_use]
    pub const fn is_permanently_failed(&self, max_attempts: u32) -> bool {
        matches!(self.status, BundleStatus::Failed) && self.import_attempt_count >= max_attempts
    }
}

#[must_use]
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_queued_at_is_set_once_but_last_queued_at_updates() {
        let mut record = BundleRecord::new(Id::random(), Id::random(), 100);
        record.transition(BundleStatus::Queued, 100);
        record.transition(BundleStatus::Downloading, 200);
        record.transition(BundleStatus::Failed, 300);
        record.transition(BundleStatus::Queued, 400);

        assert_eq!(record.first_queued_at, Some(100));
        assert_eq!(record.last_queued_at, Some(400));
        assert_eq!(record.last_status_change_at, 400);
    }

    #[test]
    fn first_fully_indexed_at_is_set_once() {
        let mut record = BundleRecord::new(Id::random(), Id::random(), 0);
        record.transition(BundleStatus::Indexed, 10);
        record.transition(BundleStatus::Failed, 20);
        record.transition(BundleStatus::Indexed, 30);
        assert_eq!(record.first_fully_indexed_at, Some(10));
    }

    #[test]
    fn permanently_failed_requires_both_status_and_attempt_cap() {
        let mut record = BundleRecord::new(Id::random(), Id::random(), 0);
        record.transition(BundleStatus::Failed, 10);
        record.import_attempt_count = 4;
        assert!(!record.is_permanently_failed(5));
        record.import_attempt_count = 5;
        assert!(record.is_permanently_failed(5));
    }
}
