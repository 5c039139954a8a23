//! In-memory authoritative snapshot of persisted state.
//!
//! The store is a write-through cache: the diff engines persist first and
//! only then add to the snapshot. It is shared between the cycle (the single
//! writer) and request-serving readers such as phone lookups.
//!
//! Readers take an `Arc<Snapshot>` and never observe a partial rebuild:
//! `full_sync` builds a new snapshot off to the side and swaps the pointer
//! under the write lock. Incremental writes copy-on-write through
//! `Arc::make_mut`, so a reader holding an older `Arc` keeps a consistent view.

mod collections;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::models::{Announcement, Association, Subject, User};
use crate::storage::Repositories;

pub use collections::{Snapshot, normalize_phone};

/// Shared handle to the current snapshot.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    /// A store whose collections are all unloaded.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Current snapshot.
    ///
    /// Hold the returned `Arc` only briefly: writes made while it is alive
    /// copy the whole snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Reload every collection from storage and atomically swap it in.
    ///
    /// On a storage error the previous snapshot is left untouched.
    pub async fn full_sync(&self, repos: &Repositories) -> Result<()> {
        log::info!("Performing full synchronization with storage...");

        let (users, subjects, associations, announcements) = tokio::try_join!(
            repos.users.get_all(),
            repos.subjects.get_all(),
            repos.associations.get_all(),
            repos.announcements.get_all(),
        )?;

        log::info!(
            "Loaded {} users, {} subjects, {} enrollments, {} posts",
            users.len(),
            subjects.len(),
            associations.len(),
            announcements.len()
        );

        let snapshot = Snapshot::build(users, subjects, associations, announcements);
        self.replace(snapshot);

        log::info!("Full synchronization complete.");
        Ok(())
    }

    /// Swap in a new snapshot.
    pub fn replace(&self, snapshot: Snapshot) {
        *self.current.write() = Arc::new(snapshot);
    }

    /// Drop all cached state back to the unloaded sentinel.
    pub fn invalidate(&self) {
        log::warn!("Snapshot invalidated; a full sync is required");
        self.replace(Snapshot::unloaded());
    }

    /// Add a user. Idempotent on the registration id.
    pub fn add_user(&self, user: User) -> bool {
        self.mutate(|snapshot| snapshot.insert_user(user))
    }

    /// Add a subject. Idempotent on the (name, crypto id) key.
    pub fn add_subject(&self, subject: Subject) -> bool {
        self.mutate(|snapshot| snapshot.insert_subject(subject))
    }

    /// Add an association. Idempotent; rejects unknown users or subjects.
    pub fn add_association(&self, association: Association) -> bool {
        self.mutate(|snapshot| snapshot.insert_association(association))
    }

    pub fn remove_association(&self, association: &Association) -> bool {
        self.mutate(|snapshot| snapshot.remove_association(association))
    }

    /// Add an announcement. Idempotent on the (url, date) key; rejects unknown subjects.
    pub fn add_announcement(&self, announcement: Announcement) -> bool {
        self.mutate(|snapshot| snapshot.insert_announcement(announcement))
    }

    /// Look up a user through the phone index.
    pub fn lookup_user_by_phone(&self, phone: &str) -> Option<User> {
        self.current.read().user_by_phone(phone).cloned()
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        let mut guard = self.current.write();
        f(Arc::make_mut(&mut guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FailingRepository, announcement, seeded_repositories, subject, user};

    #[tokio::test]
    async fn test_full_sync_loads_every_collection() {
        let repos = seeded_repositories(
            vec![user(1, "2021001")],
            vec![subject(10, "Cálculo I", "c1")],
            vec![Association::new(1, 10)],
            vec![announcement(1, 10, "/a/1", "2024-05-01")],
        );
        let store = SnapshotStore::new();
        assert!(!store.snapshot().is_loaded());

        store.full_sync(&repos).await.unwrap();

        let snapshot = store.snapshot();
        assert!(snapshot.is_loaded());
        assert_eq!(snapshot.user_count(), 1);
        assert_eq!(snapshot.subject_count(), 1);
        assert_eq!(snapshot.association_count(), 1);
        assert_eq!(snapshot.announcement_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_full_sync_keeps_previous_snapshot() {
        let mut repos = seeded_repositories(
            vec![user(1, "2021001")],
            vec![subject(10, "Cálculo I", "c1")],
            vec![],
            vec![],
        );
        let store = SnapshotStore::new();
        store.full_sync(&repos).await.unwrap();

        repos.announcements = Arc::new(FailingRepository::<Announcement>::new());
        assert!(store.full_sync(&repos).await.is_err());

        let snapshot = store.snapshot();
        assert!(snapshot.is_loaded());
        assert_eq!(snapshot.user_count(), 1);
        assert_eq!(snapshot.subject_count(), 1);
    }

    #[test]
    fn test_insertion_is_idempotent() {
        let store = SnapshotStore::from_snapshot(Snapshot::build(
            vec![user(1, "2021001")],
            vec![],
            vec![],
            vec![],
        ));

        assert!(store.add_subject(subject(10, "Cálculo I", "c1")));
        assert!(!store.add_subject(subject(10, "Cálculo I", "c1")));
        assert!(store.add_association(Association::new(1, 10)));
        assert!(!store.add_association(Association::new(1, 10)));
        assert!(store.add_announcement(announcement(1, 10, "/a/1", "2024-05-01")));
        assert!(!store.add_announcement(announcement(2, 10, "/a/1", "2024-05-01")));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.subject_count(), 1);
        assert_eq!(snapshot.association_count(), 1);
        assert_eq!(snapshot.announcement_count(), 1);
    }

    #[test]
    fn test_readers_keep_their_view_across_writes() {
        let store = SnapshotStore::from_snapshot(Snapshot::build(vec![], vec![], vec![], vec![]));
        let before = store.snapshot();

        store.add_subject(subject(11, "Física I", "f1"));

        assert_eq!(before.subject_count(), 0);
        assert_eq!(store.snapshot().subject_count(), 1);
    }

    #[test]
    fn test_adds_to_unloaded_collections_are_ignored() {
        let store = SnapshotStore::new();
        assert!(!store.add_subject(subject(10, "Cálculo I", "c1")));
        assert!(store.snapshot().missing_collections().contains(&"subjects"));
    }

    #[test]
    fn test_lookup_missing_phone_returns_none() {
        let store = SnapshotStore::new();
        assert!(store.lookup_user_by_phone("5511900000001").is_none());
    }
}
