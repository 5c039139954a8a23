//! Per-cycle statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summary of one completed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub users_processed: usize,
    pub users_failed: usize,
    pub subjects_added: usize,
    pub associations_added: usize,
    pub associations_removed: usize,
    pub announcements_added: usize,
    pub orphans_skipped: usize,
    pub notifications_dispatched: usize,
}

impl CycleReport {
    pub fn started_now() -> Self {
        let now = Utc::now();
        Self {
            start_time: now,
            end_time: now,
            users_processed: 0,
            users_failed: 0,
            subjects_added: 0,
            associations_added: 0,
            associations_removed: 0,
            announcements_added: 0,
            orphans_skipped: 0,
            notifications_dispatched: 0,
        }
    }

    /// Whether the cycle changed any persisted state.
    pub fn has_changes(&self) -> bool {
        self.subjects_added + self.associations_added + self.associations_removed
            + self.announcements_added
            > 0
    }

    pub fn log_summary(&self) {
        let elapsed = self.end_time - self.start_time;
        log::info!(
            "Cycle finished in {}s: {} users ({} failed), {} new subjects, +{}/-{} enrollments, {} new posts, {} orphaned, {} notifications",
            elapsed.num_seconds(),
            self.users_processed,
            self.users_failed,
            self.subjects_added,
            self.associations_added,
            self.associations_removed,
            self.announcements_added,
            self.orphans_skipped,
            self.notifications_dispatched
        );
    }
}
