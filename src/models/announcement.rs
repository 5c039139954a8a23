//! Announcement ("post") data structures.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::storage::Record;

/// Identity of an announcement: canonical URL plus publish date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnouncementKey {
    pub url: String,
    pub published_on: NaiveDate,
}

/// A persisted announcement. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Local id assigned by storage
    pub id: i64,

    /// Subject the announcement was posted under
    pub subject_id: i64,

    /// Canonical URL of the post
    pub url: String,

    /// Publish date as shown by the portal
    pub published_on: NaiveDate,

    /// Text content
    pub content: String,
}

impl Announcement {
    pub fn identity(&self) -> AnnouncementKey {
        AnnouncementKey {
            url: self.url.clone(),
            published_on: self.published_on,
        }
    }

    /// Render a notification message from a template.
    ///
    /// Supported placeholders: `{subject}`, `{content}`, `{url}`, `{date}`.
    pub fn format(&self, template: &str, subject_name: &str) -> String {
        template
            .replace("{subject}", subject_name)
            .replace("{date}", &self.published_on.format("%d/%m/%Y").to_string())
            .replace("{url}", &self.url)
            .replace("{content}", self.content.trim())
    }
}

/// An announcement ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAnnouncement {
    pub subject_id: i64,
    pub url: String,
    pub published_on: NaiveDate,
    pub content: String,
}

impl NewAnnouncement {
    pub fn identity(&self) -> AnnouncementKey {
        AnnouncementKey {
            url: self.url.clone(),
            published_on: self.published_on,
        }
    }
}

/// A post as listed on a subject's portal page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedPost {
    /// URL as found on the page; may be relative
    pub url: String,
    pub published_on: NaiveDate,
    pub content: String,
}

impl Record for Announcement {
    const COLLECTION: &'static str = "announcements";
    type Key = AnnouncementKey;
    type Draft = NewAnnouncement;

    fn key(&self) -> AnnouncementKey {
        self.identity()
    }

    fn local_id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn from_draft(draft: NewAnnouncement, id: i64) -> Self {
        Self {
            id,
            subject_id: draft.subject_id,
            url: draft.url,
            published_on: draft.published_on,
            content: draft.content,
        }
    }
}
