//! Announcement reconciliation and notification fan-out.
//!
//! Users are scraped one at a time, so an announcement on a shared subject
//! is rediscovered once per enrolled user in the same cycle. The cycle's
//! `handled` set records every key persisted during the cycle so the second
//! and later discoveries are skipped.

use std::collections::HashSet;
use std::time::Duration;

use url::Url;

use crate::error::Result;
use crate::models::{AnnouncementKey, Config, NewAnnouncement, ScrapedPost, Subject};
use crate::services::{Dispatcher, Recipient, ScrapingService};
use crate::snapshot::SnapshotStore;
use crate::storage::Repositories;
use crate::utils::canonical_url;

/// Knobs for post reconciliation, resolved once from config.
#[derive(Debug, Clone)]
pub struct PostSettings {
    /// Base relative post links are resolved against
    pub base_url: Url,
    pub template: String,
    pub broadcast_channel: Option<String>,
    /// Pause after each announcement's fan-out
    pub pacing: Duration,
}

impl PostSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(&config.sync.portal_base_url)?,
            template: config.notifier.message_template.clone(),
            broadcast_channel: config.notifier.broadcast_channel.clone(),
            pacing: config.notifier.pacing(),
        })
    }
}

/// What one post pass found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDiff {
    /// Announcements persisted and notified
    pub added: usize,
    /// Already persisted by an earlier cycle
    pub already_known: usize,
    /// Already persisted earlier in this cycle
    pub handled_this_cycle: usize,
    /// New but without any enrolled user
    pub orphaned: usize,
    /// Messages handed to the dispatcher
    pub notifications: usize,
    /// Subjects whose posts could not be fetched
    pub failed_subjects: usize,
}

pub struct PostSync<'a> {
    store: &'a SnapshotStore,
    repos: &'a Repositories,
    dispatcher: &'a Dispatcher,
    settings: &'a PostSettings,
}

impl<'a> PostSync<'a> {
    pub fn new(
        store: &'a SnapshotStore,
        repos: &'a Repositories,
        dispatcher: &'a Dispatcher,
        settings: &'a PostSettings,
    ) -> Self {
        Self {
            store,
            repos,
            dispatcher,
            settings,
        }
    }

    /// Fetch and reconcile the posts of every subject in `subjects`.
    ///
    /// A subject whose page fails to load is skipped; storage errors abort.
    pub async fn apply<S: ScrapingService>(
        &self,
        scraper: &S,
        session: &S::Session,
        subjects: &[Subject],
        handled: &mut HashSet<AnnouncementKey>,
    ) -> Result<PostDiff> {
        let mut diff = PostDiff::default();

        for subject in subjects {
            match scraper.get_posts(session, subject).await {
                Ok(posts) => {
                    self.reconcile_subject(subject, posts, handled, &mut diff)
                        .await?
                }
                Err(e) => {
                    log::warn!("Failed to fetch posts for {}: {}", subject.name, e);
                    diff.failed_subjects += 1;
                }
            }
        }
        Ok(diff)
    }

    /// Reconcile one subject's posts, oldest first.
    async fn reconcile_subject(
        &self,
        subject: &Subject,
        posts: Vec<ScrapedPost>,
        handled: &mut HashSet<AnnouncementKey>,
        diff: &mut PostDiff,
    ) -> Result<()> {
        // The portal lists newest first
        for post in posts.into_iter().rev() {
            let draft = NewAnnouncement {
                subject_id: subject.id,
                url: canonical_url(&self.settings.base_url, &post.url),
                published_on: post.published_on,
                content: post.content,
            };
            let key = draft.identity();

            let recipients: Vec<String> = {
                let snapshot = self.store.snapshot();
                if snapshot.contains_announcement(&key) {
                    diff.already_known += 1;
                    continue;
                }
                if handled.contains(&key) {
                    diff.handled_this_cycle += 1;
                    continue;
                }
                snapshot
                    .users_for_subject(subject.id)
                    .into_iter()
                    .map(|u| u.phone.clone())
                    .collect()
            };

            if recipients.is_empty() {
                log::warn!(
                    "Announcement {} ({}) in {} has no enrolled users; not persisting",
                    key.url,
                    key.published_on,
                    subject.name
                );
                diff.orphaned += 1;
                continue;
            }

            let announcement = self.repos.announcements.save(draft).await?;
            self.store.add_announcement(announcement.clone());
            handled.insert(key);
            diff.added += 1;

            log::info!(
                "New announcement in {}: {} ({} recipients)",
                subject.name,
                announcement.url,
                recipients.len()
            );

            let message = announcement.format(&self.settings.template, &subject.name);
            for phone in recipients {
                self.dispatcher
                    .dispatch(Recipient::Direct(phone), message.clone());
                diff.notifications += 1;
            }
            if let Some(channel) = &self.settings.broadcast_channel {
                self.dispatcher
                    .dispatch(Recipient::Broadcast(channel.clone()), message);
                diff.notifications += 1;
            }

            if !self.settings.pacing.is_zero() {
                tokio::time::sleep(self.settings.pacing).await;
            }
        }
        Ok(())
    }
}
