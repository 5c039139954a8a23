//! Fixtures and scripted collaborators shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::error::{AppError, Result};
use crate::models::{
    Announcement, Association, Config, ScrapedPost, ScrapedSubject, Subject, User,
};
use crate::pipeline::RecoveryCallback;
use crate::services::{MessageSender, NotificationService, Recipient, ScrapingService};
use crate::snapshot::SnapshotStore;
use crate::storage::{MemoryRepository, Record, Repositories, Repository};

pub const BASE_URL: &str = "https://portal.example.edu/";

// --- Builders ---

pub fn user(id: i64, registration: &str) -> User {
    User {
        id,
        phone: format!("55119{id:08}"),
        registration: registration.to_string(),
        credential: format!("pw-{registration}"),
        name: Some(format!("Aluno {id}")),
    }
}

pub fn subject(id: i64, name: &str, crypto_id: &str) -> Subject {
    Subject {
        id,
        name: name.to_string(),
        crypto_id: crypto_id.to_string(),
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// A stored announcement; `/`-relative URLs are stored in canonical form.
pub fn announcement(id: i64, subject_id: i64, url: &str, published_on: &str) -> Announcement {
    let url = match url.strip_prefix('/') {
        Some(path) => format!("{BASE_URL}{path}"),
        None => url.to_string(),
    };
    Announcement {
        id,
        subject_id,
        url,
        published_on: date(published_on),
        content: format!("content of {id}"),
    }
}

pub fn scraped_subject(name: &str, crypto_id: Option<&str>) -> ScrapedSubject {
    ScrapedSubject {
        name: name.to_string(),
        crypto_id: crypto_id.map(str::to_string),
    }
}

pub fn scraped_post(url: &str, published_on: &str, content: &str) -> ScrapedPost {
    ScrapedPost {
        url: url.to_string(),
        published_on: date(published_on),
        content: content.to_string(),
    }
}

/// Default config with every delay zeroed.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.sync.portal_base_url = BASE_URL.to_string();
    config.sync.user_delay_ms = 0;
    config.notifier.retry_delay_ms = 0;
    config.notifier.pacing_ms = 0;
    config
}

pub fn seeded_repositories(
    users: Vec<User>,
    subjects: Vec<Subject>,
    associations: Vec<Association>,
    announcements: Vec<Announcement>,
) -> Repositories {
    Repositories {
        users: Arc::new(MemoryRepository::with_records(users)),
        subjects: Arc::new(MemoryRepository::with_records(subjects)),
        associations: Arc::new(MemoryRepository::with_records(associations)),
        announcements: Arc::new(MemoryRepository::with_records(announcements)),
    }
}

pub async fn loaded_store(repos: &Repositories) -> SnapshotStore {
    let store = SnapshotStore::new();
    store.full_sync(repos).await.unwrap();
    store
}

// --- Collaborators ---

/// Repository whose every call fails.
pub struct FailingRepository<T>(PhantomData<fn() -> T>);

impl<T> FailingRepository<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

#[async_trait]
impl<T: Record> Repository<T> for FailingRepository<T> {
    async fn get_all(&self) -> Result<Vec<T>> {
        Err(AppError::storage(T::COLLECTION, "unavailable"))
    }

    async fn save(&self, _draft: T::Draft) -> Result<T> {
        Err(AppError::storage(T::COLLECTION, "unavailable"))
    }

    async fn delete(&self, _key: &T::Key) -> Result<()> {
        Err(AppError::storage(T::COLLECTION, "unavailable"))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Recipient, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(Recipient, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn send_to(&self, recipient: &Recipient, message: &str) {
        self.sent.lock().push((recipient.clone(), message.to_string()));
    }
}

/// Notifier whose deliveries never complete.
#[derive(Default)]
pub struct StalledNotifier {
    started: AtomicUsize,
}

impl StalledNotifier {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationService for StalledNotifier {
    async fn send_to(&self, _recipient: &Recipient, _message: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
    }
}

/// Sender that fails its first `n` attempts.
pub struct FlakySender {
    failures_left: AtomicU32,
    attempts: AtomicU32,
    delivered: Mutex<Vec<String>>,
}

impl FlakySender {
    pub fn failing(n: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(n),
            attempts: AtomicU32::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl MessageSender for FlakySender {
    async fn deliver(&self, recipient: &Recipient, message: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::delivery(recipient.to_string(), "provider unavailable"));
        }
        self.delivered.lock().push(message.to_string());
        Ok(())
    }
}

/// Recovery callback that only counts invocations.
#[derive(Default)]
pub struct CountingResync {
    calls: AtomicU32,
    fail: bool,
}

impl CountingResync {
    pub fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecoveryCallback for CountingResync {
    async fn resync(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(AppError::storage("users", "unavailable"))
        } else {
            Ok(())
        }
    }
}

/// Scripted portal. Sessions are the registration id.
#[derive(Default)]
pub struct FakeScraper {
    subjects: Mutex<HashMap<String, Vec<ScrapedSubject>>>,
    posts: Mutex<HashMap<String, Vec<ScrapedPost>>>,
    rejected: Mutex<HashSet<String>>,
    broken_subjects: Mutex<HashSet<String>>,
    broken_posts: Mutex<HashSet<String>>,
    logout_fails: Mutex<bool>,
    logins: AtomicUsize,
    logouts: AtomicUsize,
}

impl FakeScraper {
    pub fn set_subjects(&self, registration: &str, subjects: Vec<ScrapedSubject>) {
        self.subjects
            .lock()
            .insert(registration.to_string(), subjects);
    }

    /// Posts listed under a subject, newest first.
    pub fn set_posts(&self, crypto_id: &str, posts: Vec<ScrapedPost>) {
        self.posts.lock().insert(crypto_id.to_string(), posts);
    }

    pub fn reject_login(&self, registration: &str) {
        self.rejected.lock().insert(registration.to_string());
    }

    pub fn fail_subjects(&self, registration: &str) {
        self.broken_subjects.lock().insert(registration.to_string());
    }

    pub fn fail_posts(&self, crypto_id: &str) {
        self.broken_posts.lock().insert(crypto_id.to_string());
    }

    pub fn fail_logout(&self) {
        *self.logout_fails.lock() = true;
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScrapingService for FakeScraper {
    type Session = String;

    async fn login(&self, registration: &str, _credential: &str) -> Result<String> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.rejected.lock().contains(registration) {
            return Err(AppError::auth(registration, "invalid credential"));
        }
        Ok(registration.to_string())
    }

    async fn logout(&self, _session: String) -> Result<()> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        if *self.logout_fails.lock() {
            return Err(AppError::scrape("logout", "session already expired"));
        }
        Ok(())
    }

    async fn get_subjects(&self, session: &String) -> Result<Vec<ScrapedSubject>> {
        if self.broken_subjects.lock().contains(session) {
            return Err(AppError::scrape(session.as_str(), "subject list timed out"));
        }
        Ok(self
            .subjects
            .lock()
            .get(session)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_posts(&self, _session: &String, subject: &Subject) -> Result<Vec<ScrapedPost>> {
        if self.broken_posts.lock().contains(&subject.crypto_id) {
            return Err(AppError::scrape(subject.name.as_str(), "page timed out"));
        }
        Ok(self
            .posts
            .lock()
            .get(&subject.crypto_id)
            .cloned()
            .unwrap_or_default())
    }
}
