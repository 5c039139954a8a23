//! Enrollment reconciliation for a single user.
//!
//! Compares the subjects freshly scraped for a user against the associations
//! the snapshot knows, persisting only the difference. Identity is always the
//! (name, crypto id) pair the portal yields, never the local id.

use std::collections::HashSet;

use crate::error::Result;
use crate::models::{Association, NewSubject, ScrapedSubject, User};
use crate::snapshot::SnapshotStore;
use crate::storage::Repositories;

/// What one enrollment pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrollmentDiff {
    /// Subjects seen for the first time by any user
    pub added_subjects: usize,
    /// Associations created
    pub added: usize,
    /// Associations deleted
    pub removed: usize,
    /// Scraped entries without a crypto id
    pub skipped_transient: usize,
    /// Removals withheld because the scrape came back empty
    pub removals_withheld: bool,
}

impl EnrollmentDiff {
    pub fn has_changes(&self) -> bool {
        self.added_subjects + self.added + self.removed > 0
    }
}

pub struct EnrollmentSync<'a> {
    store: &'a SnapshotStore,
    repos: &'a Repositories,
}

impl<'a> EnrollmentSync<'a> {
    pub fn new(store: &'a SnapshotStore, repos: &'a Repositories) -> Self {
        Self { store, repos }
    }

    /// Reconcile `user`'s associations with `scraped`.
    ///
    /// Every write hits storage before the snapshot. A storage error aborts
    /// the pass; whatever was written before it stays consistent in both.
    pub async fn apply(&self, user: &User, scraped: Vec<ScrapedSubject>) -> Result<EnrollmentDiff> {
        let mut diff = EnrollmentDiff::default();

        let mut fresh: Vec<NewSubject> = Vec::with_capacity(scraped.len());
        let mut seen = HashSet::new();
        for entry in scraped {
            match entry.into_new() {
                Some(subject) => {
                    if seen.insert(subject.identity()) {
                        fresh.push(subject);
                    }
                }
                None => diff.skipped_transient += 1,
            }
        }

        self.remove_dropped(user, &fresh, &mut diff).await?;

        for subject in fresh {
            self.add_enrollment(user, subject, &mut diff).await?;
        }

        if diff.has_changes() {
            log::info!(
                "Enrollments for {}: {} new subjects, +{} / -{} associations",
                user.display_name(),
                diff.added_subjects,
                diff.added,
                diff.removed
            );
        }
        Ok(diff)
    }

    async fn remove_dropped(
        &self,
        user: &User,
        fresh: &[NewSubject],
        diff: &mut EnrollmentDiff,
    ) -> Result<()> {
        let dropped: Vec<(Association, String)> = {
            let snapshot = self.store.snapshot();
            let known = snapshot.subjects_for_user(user.id);
            if known.is_empty() {
                return Ok(());
            }

            if fresh.is_empty() {
                log::warn!(
                    "Portal listed no subjects for {} who has {} known enrollments; keeping them",
                    user.display_name(),
                    known.len()
                );
                diff.removals_withheld = true;
                return Ok(());
            }

            let fresh_ids: HashSet<&str> = fresh.iter().map(|s| s.crypto_id.as_str()).collect();
            known
                .into_iter()
                .filter(|s| !fresh_ids.contains(s.crypto_id.as_str()))
                .map(|s| (Association::new(user.id, s.id), s.name.clone()))
                .collect()
        };

        for (association, name) in dropped {
            self.repos.associations.delete(&association).await?;
            self.store.remove_association(&association);
            diff.removed += 1;
            log::debug!("{} is no longer enrolled in {}", user.display_name(), name);
        }
        Ok(())
    }

    async fn add_enrollment(
        &self,
        user: &User,
        new_subject: NewSubject,
        diff: &mut EnrollmentDiff,
    ) -> Result<()> {
        let existing = self
            .store
            .snapshot()
            .subject_by_key(&new_subject.identity())
            .cloned();

        let subject = match existing {
            Some(subject) => subject,
            None => {
                let subject = self.repos.subjects.save(new_subject).await?;
                self.store.add_subject(subject.clone());
                diff.added_subjects += 1;
                log::info!("New subject: {} ({})", subject.name, subject.crypto_id);
                subject
            }
        };

        let association = Association::new(user.id, subject.id);
        if self.store.snapshot().has_association(&association) {
            return Ok(());
        }

        let association = self.repos.associations.save(association).await?;
        self.store.add_association(association);
        diff.added += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{loaded_store, scraped_subject, seeded_repositories, subject, user};

    #[tokio::test]
    async fn test_new_user_gets_subjects_and_associations() {
        let repos = seeded_repositories(vec![user(1, "2021001")], vec![], vec![], vec![]);
        let store = loaded_store(&repos).await;
        let u = user(1, "2021001");

        let diff = EnrollmentSync::new(&store, &repos)
            .apply(
                &u,
                vec![
                    scraped_subject("Cálculo I", Some("c1")),
                    scraped_subject("Física I", Some("f1")),
                    scraped_subject("Secretaria", None),
                ],
            )
            .await
            .unwrap();

        assert_eq!(diff.added_subjects, 2);
        assert_eq!(diff.added, 2);
        assert_eq!(diff.removed, 0);
        assert_eq!(diff.skipped_transient, 1);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.subject_count(), 2);
        assert_eq!(snapshot.subjects_for_user(1).len(), 2);
        assert_eq!(repos.subjects.get_all().await.unwrap().len(), 2);
        assert_eq!(repos.associations.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rerun_with_same_scrape_changes_nothing() {
        let repos = seeded_repositories(
            vec![user(1, "2021001")],
            vec![subject(10, "Cálculo I", "c1")],
            vec![Association::new(1, 10)],
            vec![],
        );
        let store = loaded_store(&repos).await;

        let diff = EnrollmentSync::new(&store, &repos)
            .apply(&user(1, "2021001"), vec![scraped_subject("Cálculo I", Some("c1"))])
            .await
            .unwrap();

        assert!(!diff.has_changes());
        assert_eq!(repos.associations.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_enrollment_removes_association_but_keeps_subject() {
        let repos = seeded_repositories(
            vec![user(1, "2021001")],
            vec![subject(10, "Cálculo I", "c1"), subject(11, "Física I", "f1")],
            vec![Association::new(1, 10), Association::new(1, 11)],
            vec![],
        );
        let store = loaded_store(&repos).await;

        let diff = EnrollmentSync::new(&store, &repos)
            .apply(&user(1, "2021001"), vec![scraped_subject("Cálculo I", Some("c1"))])
            .await
            .unwrap();

        assert_eq!(diff.removed, 1);
        let snapshot = store.snapshot();
        assert!(!snapshot.has_association(&Association::new(1, 11)));
        assert!(snapshot.has_association(&Association::new(1, 10)));
        assert!(snapshot.subject(11).is_some());
        assert_eq!(
            repos.associations.get_all().await.unwrap(),
            vec![Association::new(1, 10)]
        );
    }

    #[tokio::test]
    async fn test_renamed_subject_is_a_new_subject() {
        let repos = seeded_repositories(
            vec![user(1, "2021001")],
            vec![subject(10, "Cálculo I", "c1")],
            vec![Association::new(1, 10)],
            vec![],
        );
        let store = loaded_store(&repos).await;

        let diff = EnrollmentSync::new(&store, &repos)
            .apply(&user(1, "2021001"), vec![scraped_subject("Cálculo 1", Some("c1"))])
            .await
            .unwrap();

        // Same crypto id, so the old association is kept
        assert_eq!(diff.removed, 0);
        assert_eq!(diff.added_subjects, 1);
        assert_eq!(diff.added, 1);
        assert_eq!(store.snapshot().subject_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_scrape_keeps_known_enrollments() {
        let repos = seeded_repositories(
            vec![user(1, "2021001")],
            vec![subject(10, "Cálculo I", "c1")],
            vec![Association::new(1, 10)],
            vec![],
        );
        let store = loaded_store(&repos).await;

        let diff = EnrollmentSync::new(&store, &repos)
            .apply(&user(1, "2021001"), vec![scraped_subject("Secretaria", None)])
            .await
            .unwrap();

        assert!(diff.removals_withheld);
        assert_eq!(diff.removed, 0);
        assert!(store.snapshot().has_association(&Association::new(1, 10)));
    }

    #[tokio::test]
    async fn test_shared_subject_is_reused_across_users() {
        let repos = seeded_repositories(
            vec![user(1, "2021001"), user(2, "2021002")],
            vec![subject(10, "Cálculo I", "c1")],
            vec![Association::new(1, 10)],
            vec![],
        );
        let store = loaded_store(&repos).await;

        let diff = EnrollmentSync::new(&store, &repos)
            .apply(&user(2, "2021002"), vec![scraped_subject("Cálculo I", Some("c1"))])
            .await
            .unwrap();

        assert_eq!(diff.added_subjects, 0);
        assert_eq!(diff.added, 1);
        assert_eq!(store.snapshot().users_for_subject(10).len(), 2);
    }
}
