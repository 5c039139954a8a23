// src/models/mod.rs

//! Domain models for the sync engine.
//!
//! Each persisted entity has a `Draft` form (what the scraper yields, before
//! storage assigns a local id) and an identity key used for deduplication.

mod announcement;
mod association;
mod config;
mod report;
mod subject;
mod user;

// Re-export all public types
pub use announcement::{Announcement, AnnouncementKey, NewAnnouncement, ScrapedPost};
pub use association::Association;
pub use config::{
    Config, LoggingConfig, NotifierConfig, RecoveryConfig, SchedulerConfig, StorageConfig,
    SyncConfig,
};
pub use report::CycleReport;
pub use subject::{NewSubject, ScrapedSubject, Subject, SubjectKey};
pub use user::{NewUser, User};
