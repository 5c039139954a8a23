//! One full pass over every registered user.
//!
//! `Validating -> Processing(user) for each user -> Idle`. Users are handled
//! strictly one after the other, each on a fresh portal session. Per-user
//! failures are logged and skipped; only an inconsistent snapshot escapes
//! `run`, after the recovery controller has handled it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{AnnouncementKey, Config, CycleReport, Subject, User};
use crate::services::{Dispatcher, ScrapingService};
use crate::snapshot::SnapshotStore;
use crate::storage::Repositories;

use super::enrollments::{EnrollmentDiff, EnrollmentSync};
use super::posts::{PostDiff, PostSettings, PostSync};
use super::recovery::RecoveryController;

/// How a call to [`SyncCycle::run`] ended.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle was still running
    Skipped,
}

#[derive(Debug, Default)]
struct UserOutcome {
    enrollments: EnrollmentDiff,
    posts: Option<PostDiff>,
}

pub struct SyncCycle<S: ScrapingService> {
    scraper: S,
    store: Arc<SnapshotStore>,
    repos: Repositories,
    dispatcher: Arc<Dispatcher>,
    settings: PostSettings,
    user_delay: Duration,
    running: Mutex<()>,
}

impl<S: ScrapingService> SyncCycle<S> {
    pub fn new(
        scraper: S,
        store: Arc<SnapshotStore>,
        repos: Repositories,
        dispatcher: Arc<Dispatcher>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            scraper,
            store,
            repos,
            dispatcher,
            settings: PostSettings::from_config(config)?,
            user_delay: config.sync.user_delay(),
            running: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn repos(&self) -> &Repositories {
        &self.repos
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Run one cycle.
    ///
    /// Returns `Skipped` without doing anything if a cycle is already in
    /// progress. On success the recovery counter is reset.
    pub async fn run(&self, recovery: &mut RecoveryController) -> Result<CycleOutcome> {
        let Ok(_guard) = self.running.try_lock() else {
            log::warn!("Previous cycle still running; skipping this tick");
            return Ok(CycleOutcome::Skipped);
        };

        match self.execute().await {
            Ok(report) => {
                recovery.reset();
                report.log_summary();
                Ok(CycleOutcome::Completed(report))
            }
            Err(e) => {
                log::error!("Cycle aborted: {e}");
                recovery.handle_failure(&e).await;
                Err(e)
            }
        }
    }

    /// Users to process, or the collections that are not loaded.
    fn validate(&self) -> Result<Vec<User>> {
        let snapshot = self.store.snapshot();
        let missing = snapshot.missing_collections();
        if !missing.is_empty() {
            return Err(AppError::SnapshotInconsistent { missing });
        }
        Ok(snapshot.users().cloned().collect())
    }

    async fn execute(&self) -> Result<CycleReport> {
        let users = self.validate()?;
        let mut report = CycleReport::started_now();
        let mut handled: HashSet<AnnouncementKey> = HashSet::new();

        log::info!("Starting cycle over {} users", users.len());

        for (i, user) in users.iter().enumerate() {
            if i > 0 && !self.user_delay.is_zero() {
                tokio::time::sleep(self.user_delay).await;
            }

            match self.process_user(user, &mut handled).await {
                Ok(outcome) => {
                    report.users_processed += 1;
                    report.subjects_added += outcome.enrollments.added_subjects;
                    report.associations_added += outcome.enrollments.added;
                    report.associations_removed += outcome.enrollments.removed;
                    if let Some(posts) = outcome.posts {
                        report.announcements_added += posts.added;
                        report.orphans_skipped += posts.orphaned;
                        report.notifications_dispatched += posts.notifications;
                    }
                }
                Err(e) if e.is_snapshot_inconsistent() => return Err(e),
                Err(e) => {
                    log::warn!("Skipping user {}: {}", user.display_name(), e);
                    report.users_failed += 1;
                }
            }
        }

        report.end_time = Utc::now();
        Ok(report)
    }

    async fn process_user(
        &self,
        user: &User,
        handled: &mut HashSet<AnnouncementKey>,
    ) -> Result<UserOutcome> {
        log::debug!("Processing {}", user.display_name());
        let session = self
            .scraper
            .login(&user.registration, &user.credential)
            .await?;

        let result = self.sync_user(user, &session, handled).await;

        // A failed logout must not hide the result above.
        if let Err(e) = self.scraper.logout(session).await {
            log::warn!("Logout failed for {}: {}", user.display_name(), e);
        }
        result
    }

    async fn sync_user(
        &self,
        user: &User,
        session: &S::Session,
        handled: &mut HashSet<AnnouncementKey>,
    ) -> Result<UserOutcome> {
        let scraped = self.scraper.get_subjects(session).await?;
        let enrollments = EnrollmentSync::new(&self.store, &self.repos)
            .apply(user, scraped)
            .await?;

        let subjects: Vec<Subject> = self
            .store
            .snapshot()
            .subjects_for_user(user.id)
            .into_iter()
            .cloned()
            .collect();

        if subjects.is_empty() {
            log::debug!("{} has no subjects; skipping posts", user.display_name());
            return Ok(UserOutcome {
                enrollments,
                posts: None,
            });
        }

        let posts = PostSync::new(&self.store, &self.repos, &self.dispatcher, &self.settings)
            .apply(&self.scraper, session, &subjects, handled)
            .await?;

        Ok(UserOutcome {
            enrollments,
            posts: Some(posts),
        })
    }
}
