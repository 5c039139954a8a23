//! Enrollment subjects ("disciplines").

use serde::{Deserialize, Serialize};

use crate::storage::Record;

/// Identity of a subject: the pair the scraper yields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectKey {
    pub name: String,
    pub crypto_id: String,
}

/// A persisted subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Local id assigned by storage
    pub id: i64,

    /// Display name
    pub name: String,

    /// External crypto id used by the portal to address the subject
    pub crypto_id: String,
}

impl Subject {
    pub fn identity(&self) -> SubjectKey {
        SubjectKey {
            name: self.name.clone(),
            crypto_id: self.crypto_id.clone(),
        }
    }
}

/// A subject ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubject {
    pub name: String,
    pub crypto_id: String,
}

impl NewSubject {
    pub fn identity(&self) -> SubjectKey {
        SubjectKey {
            name: self.name.clone(),
            crypto_id: self.crypto_id.clone(),
        }
    }
}

/// A subject entry as listed on the portal.
///
/// Administrative rows carry no crypto id and are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedSubject {
    pub name: String,
    #[serde(default)]
    pub crypto_id: Option<String>,
}

impl ScrapedSubject {
    /// Convert into a persistable subject, or `None` for transient entries.
    pub fn into_new(self) -> Option<NewSubject> {
        let crypto_id = self.crypto_id?.trim().to_string();
        if crypto_id.is_empty() {
            return None;
        }
        Some(NewSubject {
            name: self.name.trim().to_string(),
            crypto_id,
        })
    }
}

impl Record for Subject {
    const COLLECTION: &'static str = "subjects";
    type Key = SubjectKey;
    type Draft = NewSubject;

    fn key(&self) -> SubjectKey {
        self.identity()
    }

    fn local_id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn from_draft(draft: NewSubject, id: i64) -> Self {
        Self {
            id,
            name: draft.name,
            crypto_id: draft.crypto_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_without_crypto_id_are_dropped() {
        let admin = ScrapedSubject {
            name: "Secretaria".into(),
            crypto_id: None,
        };
        assert!(admin.into_new().is_none());

        let blank = ScrapedSubject {
            name: "Secretaria".into(),
            crypto_id: Some("  ".into()),
        };
        assert!(blank.into_new().is_none());
    }

    #[test]
    fn test_scraped_subject_is_trimmed() {
        let scraped = ScrapedSubject {
            name: " Cálculo I ".into(),
            crypto_id: Some("abc123".into()),
        };
        let new = scraped.into_new().unwrap();
        assert_eq!(new.name, "Cálculo I");
        assert_eq!(new.crypto_id, "abc123");
    }
}
