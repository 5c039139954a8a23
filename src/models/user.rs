//! Registered portal user.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::Record;

/// A user whose portal account is scraped every cycle.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Local id assigned by storage
    pub id: i64,

    /// Phone number notifications are delivered to
    pub phone: String,

    /// External registration id (stable identity)
    pub registration: String,

    /// Portal credential
    pub credential: String,

    /// Display name as shown by the portal
    #[serde(default)]
    pub name: Option<String>,
}

impl User {
    /// Name for log lines, falling back to the registration id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.registration)
    }
}

// Credentials stay out of logs.
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("phone", &self.phone)
            .field("registration", &self.registration)
            .field("credential", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

/// A user that has not been persisted yet.
#[derive(Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub phone: String,
    pub registration: String,
    pub credential: String,
    pub name: Option<String>,
}

impl Record for User {
    const COLLECTION: &'static str = "users";
    type Key = String;
    type Draft = NewUser;

    fn key(&self) -> String {
        self.registration.clone()
    }

    fn local_id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn from_draft(draft: NewUser, id: i64) -> Self {
        Self {
            id,
            phone: draft.phone,
            registration: draft.registration,
            credential: draft.credential,
            name: draft.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_credential() {
        let user = User {
            id: 1,
            phone: "5511999990000".into(),
            registration: "2021001".into(),
            credential: "hunter2".into(),
            name: None,
        };
        let rendered = format!("{user:?}");
        assert!(!rendered.contains("hunter2"));
        assert_eq!(user.display_name(), "2021001");
    }
}
