//! The four cached collections and their secondary indexes.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{Announcement, AnnouncementKey, Association, Subject, SubjectKey, User};

/// Names reported when a collection is in its unloaded state.
pub const USERS: &str = "users";
pub const SUBJECTS: &str = "subjects";
pub const ASSOCIATIONS: &str = "associations";
pub const ANNOUNCEMENTS: &str = "announcements";

/// Immutable-by-default view of all persisted entities.
///
/// Each collection is `None` until loaded; `Some` but empty is a valid,
/// loaded state.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    users: Option<BTreeMap<String, User>>,
    subjects: Option<HashMap<SubjectKey, Subject>>,
    associations: Option<BTreeSet<Association>>,
    announcements: Option<HashMap<AnnouncementKey, Announcement>>,

    user_registration_by_id: HashMap<i64, String>,
    user_registration_by_phone: HashMap<String, String>,
    subject_key_by_id: HashMap<i64, SubjectKey>,
}

impl Snapshot {
    /// A snapshot with every collection unloaded.
    pub fn unloaded() -> Self {
        Self::default()
    }

    /// Build a fully loaded snapshot from raw storage rows.
    ///
    /// Rows that repeat an identity key or reference a missing user/subject
    /// are dropped with a warning.
    pub fn build(
        users: Vec<User>,
        subjects: Vec<Subject>,
        associations: Vec<Association>,
        announcements: Vec<Announcement>,
    ) -> Self {
        let mut snapshot = Self {
            users: Some(BTreeMap::new()),
            subjects: Some(HashMap::new()),
            associations: Some(BTreeSet::new()),
            announcements: Some(HashMap::new()),
            ..Self::default()
        };

        let mut dropped = 0usize;
        for user in users {
            dropped += usize::from(!snapshot.insert_user(user));
        }
        for subject in subjects {
            dropped += usize::from(!snapshot.insert_subject(subject));
        }
        for association in associations {
            dropped += usize::from(!snapshot.insert_association(association));
        }
        for announcement in announcements {
            dropped += usize::from(!snapshot.insert_announcement(announcement));
        }

        if dropped > 0 {
            log::warn!("Snapshot build dropped {dropped} duplicate or dangling rows");
        }
        snapshot
    }

    /// Names of the collections still in their unloaded state.
    pub fn missing_collections(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.users.is_none() {
            missing.push(USERS);
        }
        if self.subjects.is_none() {
            missing.push(SUBJECTS);
        }
        if self.associations.is_none() {
            missing.push(ASSOCIATIONS);
        }
        if self.announcements.is_none() {
            missing.push(ANNOUNCEMENTS);
        }
        missing
    }

    pub fn is_loaded(&self) -> bool {
        self.missing_collections().is_empty()
    }

    // --- Read accessors ---

    /// Users ordered by registration id.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.iter().flat_map(|users| users.values())
    }

    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.iter().flat_map(|subjects| subjects.values())
    }

    pub fn associations(&self) -> impl Iterator<Item = &Association> {
        self.associations.iter().flatten()
    }

    pub fn announcements(&self) -> impl Iterator<Item = &Announcement> {
        self.announcements.iter().flat_map(|posts| posts.values())
    }

    pub fn user_count(&self) -> usize {
        self.users.as_ref().map_or(0, |c| c.len())
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.as_ref().map_or(0, |c| c.len())
    }

    pub fn association_count(&self) -> usize {
        self.associations.as_ref().map_or(0, |c| c.len())
    }

    pub fn announcement_count(&self) -> usize {
        self.announcements.as_ref().map_or(0, |c| c.len())
    }

    pub fn user(&self, id: i64) -> Option<&User> {
        let registration = self.user_registration_by_id.get(&id)?;
        self.users.as_ref()?.get(registration)
    }

    pub fn user_by_registration(&self, registration: &str) -> Option<&User> {
        self.users.as_ref()?.get(registration)
    }

    /// O(1) lookup through the phone index. Formatting characters are ignored.
    pub fn user_by_phone(&self, phone: &str) -> Option<&User> {
        let registration = self
            .user_registration_by_phone
            .get(&normalize_phone(phone))?;
        self.users.as_ref()?.get(registration)
    }

    pub fn subject(&self, id: i64) -> Option<&Subject> {
        let key = self.subject_key_by_id.get(&id)?;
        self.subjects.as_ref()?.get(key)
    }

    pub fn subject_by_key(&self, key: &SubjectKey) -> Option<&Subject> {
        self.subjects.as_ref()?.get(key)
    }

    pub fn has_association(&self, association: &Association) -> bool {
        self.associations
            .as_ref()
            .is_some_and(|c| c.contains(association))
    }

    pub fn contains_announcement(&self, key: &AnnouncementKey) -> bool {
        self.announcements
            .as_ref()
            .is_some_and(|c| c.contains_key(key))
    }

    /// Subjects the user is enrolled in, ordered by subject id.
    pub fn subjects_for_user(&self, user_id: i64) -> Vec<&Subject> {
        let Some(associations) = &self.associations else {
            return Vec::new();
        };
        associations
            .range(Association::new(user_id, i64::MIN)..=Association::new(user_id, i64::MAX))
            .filter_map(|a| self.subject(a.subject_id))
            .collect()
    }

    /// Users enrolled in the subject.
    pub fn users_for_subject(&self, subject_id: i64) -> Vec<&User> {
        self.associations()
            .filter(|a| a.subject_id == subject_id)
            .filter_map(|a| self.user(a.user_id))
            .collect()
    }

    // --- Mutators (single writer, see SnapshotStore) ---

    /// Returns `false` if the user was already present or users are unloaded.
    pub(crate) fn insert_user(&mut self, user: User) -> bool {
        let Some(users) = self.users.as_mut() else {
            return false;
        };
        if users.contains_key(&user.registration) {
            return false;
        }
        self.user_registration_by_id
            .insert(user.id, user.registration.clone());
        self.user_registration_by_phone
            .insert(normalize_phone(&user.phone), user.registration.clone());
        users.insert(user.registration.clone(), user);
        true
    }

    pub(crate) fn insert_subject(&mut self, subject: Subject) -> bool {
        let Some(subjects) = self.subjects.as_mut() else {
            return false;
        };
        let key = subject.identity();
        if subjects.contains_key(&key) {
            return false;
        }
        self.subject_key_by_id.insert(subject.id, key.clone());
        subjects.insert(key, subject);
        true
    }

    /// Rejects associations whose user or subject is not cached.
    pub(crate) fn insert_association(&mut self, association: Association) -> bool {
        if self.user(association.user_id).is_none() || self.subject(association.subject_id).is_none()
        {
            log::warn!("Refusing dangling association {association:?}");
            return false;
        }
        match self.associations.as_mut() {
            Some(associations) => associations.insert(association),
            None => false,
        }
    }

    pub(crate) fn remove_association(&mut self, association: &Association) -> bool {
        self.associations
            .as_mut()
            .is_some_and(|c| c.remove(association))
    }

    /// Rejects announcements whose subject is not cached.
    pub(crate) fn insert_announcement(&mut self, announcement: Announcement) -> bool {
        if self.subject(announcement.subject_id).is_none() {
            log::warn!(
                "Refusing announcement {} for unknown subject {}",
                announcement.url,
                announcement.subject_id
            );
            return false;
        }
        let Some(announcements) = self.announcements.as_mut() else {
            return false;
        };
        let key = announcement.identity();
        if announcements.contains_key(&key) {
            return false;
        }
        announcements.insert(key, announcement);
        true
    }
}

/// Keep only the digits of a phone number.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}
