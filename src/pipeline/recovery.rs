//! Bounded self-recovery from an inconsistent snapshot.
//!
//! The controller has a single owner (the scheduler) and is lent to each
//! cycle by `&mut`. It counts consecutive critical failures; while the
//! count is below the limit each failure triggers one resync through the
//! callback. Once the limit is reached it only reports, until a cycle
//! succeeds and the count goes back to zero.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::RecoveryConfig;
use crate::snapshot::SnapshotStore;
use crate::storage::Repositories;

/// Re-seeds the snapshot. May itself fail.
#[async_trait]
pub trait RecoveryCallback: Send + Sync {
    async fn resync(&self) -> Result<()>;
}

/// Resync by reloading the snapshot from storage.
pub struct StoreResync {
    store: Arc<SnapshotStore>,
    repos: Repositories,
}

impl StoreResync {
    pub fn new(store: Arc<SnapshotStore>, repos: Repositories) -> Self {
        Self { store, repos }
    }
}

#[async_trait]
impl RecoveryCallback for StoreResync {
    async fn resync(&self) -> Result<()> {
        self.store.full_sync(&self.repos).await
    }
}

/// Result of handling one critical failure.
#[derive(Debug)]
pub enum RecoveryOutcome {
    /// The callback ran and succeeded
    Resynced { attempt: u32 },
    /// The callback ran and failed
    ResyncFailed { attempt: u32, error: AppError },
    /// Attempts used up; the callback was not invoked
    Exhausted { attempts: u32 },
}

pub struct RecoveryController {
    attempts: u32,
    max_attempts: u32,
    callback: Arc<dyn RecoveryCallback>,
}

impl RecoveryController {
    pub fn new(callback: Arc<dyn RecoveryCallback>, max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            callback,
        }
    }

    pub fn from_config(callback: Arc<dyn RecoveryCallback>, config: &RecoveryConfig) -> Self {
        Self::new(callback, config.max_attempts)
    }

    /// Consecutive critical failures handled so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Mark the system healthy again.
    pub fn reset(&mut self) {
        if self.attempts > 0 {
            log::info!(
                "Cycle succeeded after {} recovery attempts; counter reset",
                self.attempts
            );
        }
        self.attempts = 0;
    }

    /// React to a critical cycle failure.
    pub async fn handle_failure(&mut self, error: &AppError) -> RecoveryOutcome {
        if self.attempts >= self.max_attempts {
            log::error!(
                "Recovery exhausted ({} attempts); waiting for a healthy cycle: {}",
                self.attempts,
                error
            );
            return RecoveryOutcome::Exhausted {
                attempts: self.attempts,
            };
        }

        self.attempts += 1;
        let attempt = self.attempts;
        log::warn!(
            "Critical failure ({error}); resync attempt {attempt}/{}",
            self.max_attempts
        );

        match self.callback.resync().await {
            Ok(()) => {
                log::info!("Resync attempt {attempt} succeeded");
                RecoveryOutcome::Resynced { attempt }
            }
            Err(e) => {
                log::error!("Resync attempt {attempt} failed: {e}");
                RecoveryOutcome::ResyncFailed { attempt, error: e }
            }
        }
    }

    /// Periodic resync outside of any failure; clears the counter on success.
    pub async fn scheduled_resync(&mut self) -> Result<()> {
        log::info!("Running scheduled resync");
        self.callback.resync().await?;
        self.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::CountingResync;

    fn inconsistent() -> AppError {
        AppError::SnapshotInconsistent {
            missing: vec!["users"],
        }
    }

    #[tokio::test]
    async fn test_callback_runs_at_most_max_attempts_times() {
        let callback = Arc::new(CountingResync::failing());
        let mut controller = RecoveryController::new(callback.clone(), 3);

        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.push(controller.handle_failure(&inconsistent()).await);
        }

        assert_eq!(callback.calls(), 3);
        assert_eq!(controller.attempts(), 3);
        assert!(matches!(outcomes[2], RecoveryOutcome::ResyncFailed { attempt: 3, .. }));
        assert!(matches!(outcomes[3], RecoveryOutcome::Exhausted { attempts: 3 }));
        assert!(matches!(outcomes[4], RecoveryOutcome::Exhausted { attempts: 3 }));
    }

    #[tokio::test]
    async fn test_success_opens_a_fresh_round() {
        let callback = Arc::new(CountingResync::failing());
        let mut controller = RecoveryController::new(callback.clone(), 3);

        for _ in 0..5 {
            controller.handle_failure(&inconsistent()).await;
        }
        controller.reset();
        assert_eq!(controller.attempts(), 0);

        controller.handle_failure(&inconsistent()).await;
        assert_eq!(callback.calls(), 4);
        assert_eq!(controller.attempts(), 1);

        for _ in 0..4 {
            controller.handle_failure(&inconsistent()).await;
        }
        assert_eq!(callback.calls(), 6);
    }

    #[tokio::test]
    async fn test_successful_resync_is_reported() {
        let callback = Arc::new(CountingResync::default());
        let mut controller = RecoveryController::new(callback.clone(), 3);

        let outcome = controller.handle_failure(&inconsistent()).await;

        assert!(matches!(outcome, RecoveryOutcome::Resynced { attempt: 1 }));
        // Only a completed cycle clears the counter
        assert_eq!(controller.attempts(), 1);
    }

    #[tokio::test]
    async fn test_scheduled_resync_resets_counter() {
        let callback = Arc::new(CountingResync::default());
        let mut controller = RecoveryController::new(callback.clone(), 3);
        controller.handle_failure(&inconsistent()).await;

        controller.scheduled_resync().await.unwrap();

        assert_eq!(controller.attempts(), 0);
        assert_eq!(callback.calls(), 2);
    }

    #[tokio::test]
    async fn test_store_resync_loads_the_snapshot() {
        let store = Arc::new(SnapshotStore::new());
        let callback = StoreResync::new(Arc::clone(&store), Repositories::memory());

        callback.resync().await.unwrap();

        assert!(store.snapshot().is_loaded());
    }
}
