//! Timer-driven cycle scheduling.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Timelike};
use tokio::time::MissedTickBehavior;

use crate::models::{CycleReport, SchedulerConfig};
use crate::services::ScrapingService;

use super::cycle::{CycleOutcome, SyncCycle};
use super::recovery::RecoveryController;

/// Hours of the day during which no cycle runs.
///
/// `[start, end)` in local time; wraps midnight when `start > end`.
/// `start == end` disables quiet hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    pub start: u32,
    pub end: u32,
}

impl QuietHours {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start == self.end {
            false
        } else if self.start < self.end {
            (self.start..self.end).contains(&hour)
        } else {
            hour >= self.start || hour < self.end
        }
    }
}

#[derive(Debug)]
pub enum TickOutcome {
    Quiet,
    Completed(CycleReport),
    Skipped,
    Failed,
}

pub struct Scheduler<S: ScrapingService> {
    cycle: Arc<SyncCycle<S>>,
    recovery: RecoveryController,
    interval: Duration,
    resync_every: u32,
    quiet: QuietHours,
    /// Cycles executed since the last scheduled resync
    executed: u32,
}

impl<S: ScrapingService> Scheduler<S> {
    pub fn new(
        cycle: Arc<SyncCycle<S>>,
        recovery: RecoveryController,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            cycle,
            recovery,
            interval: config.interval(),
            resync_every: config.resync_every.max(1),
            quiet: QuietHours {
                start: config.quiet_start_hour,
                end: config.quiet_end_hour,
            },
            executed: 0,
        }
    }

    pub fn recovery(&self) -> &RecoveryController {
        &self.recovery
    }

    /// Handle one timer tick at the given local hour.
    pub async fn tick(&mut self, hour: u32) -> TickOutcome {
        if self.quiet.contains(hour) {
            log::debug!("Quiet hours ({hour}h); not running");
            return TickOutcome::Quiet;
        }

        if self.executed >= self.resync_every {
            self.executed = 0;
            if let Err(e) = self.recovery.scheduled_resync().await {
                log::error!("Scheduled resync failed: {e}");
            }
        }

        match self.cycle.run(&mut self.recovery).await {
            Ok(CycleOutcome::Completed(report)) => {
                self.executed += 1;
                TickOutcome::Completed(report)
            }
            Ok(CycleOutcome::Skipped) => TickOutcome::Skipped,
            Err(_) => {
                // Already logged and handed to recovery by the cycle
                self.executed += 1;
                TickOutcome::Failed
            }
        }
    }

    /// Run cycles on the configured interval until `shutdown` resolves.
    ///
    /// Loads the snapshot first; if that fails the first cycle escalates to
    /// recovery. Outstanding notifications are drained before returning.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) {
        let store = Arc::clone(self.cycle.store());
        if let Err(e) = store.full_sync(self.cycle.repos()).await {
            log::error!("Initial full sync failed: {e}");
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        log::info!("Scheduler started (every {}s)", self.interval.as_secs());
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let hour = Local::now().hour();
                    self.tick(hour).await;
                }
            }
        }

        log::info!("Shutting down; waiting for pending notifications");
        self.cycle.dispatcher().drain().await;
    }
}
