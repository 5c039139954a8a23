//! User to subject enrollment link.

use serde::{Deserialize, Serialize};

use crate::storage::Record;

/// Many-to-many link between a user and a subject. Carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Association {
    pub user_id: i64,
    pub subject_id: i64,
}

impl Association {
    pub fn new(user_id: i64, subject_id: i64) -> Self {
        Self {
            user_id,
            subject_id,
        }
    }
}

impl Record for Association {
    const COLLECTION: &'static str = "associations";
    type Key = Association;
    type Draft = Association;

    fn key(&self) -> Association {
        *self
    }

    fn from_draft(draft: Association, _id: i64) -> Self {
        draft
    }
}
