//! Scraping service backed by a recorded portal dump.
//!
//! Used for dry runs of the sync cycle without touching the live portal.
//!
//! ```json
//! {
//!   "accounts": {
//!     "2021001": {
//!       "credential": "secret",
//!       "subjects": [
//!         { "name": "Cálculo I", "crypto_id": "c1",
//!           "posts": [ { "url": "/a/1", "published_on": "2024-05-01", "content": "..." } ] }
//!       ]
//!     }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{ScrapedPost, ScrapedSubject, Subject};
use crate::services::ScrapingService;

#[derive(Debug, Clone, Deserialize)]
struct FixtureSubject {
    name: String,
    #[serde(default)]
    crypto_id: Option<String>,
    /// Newest first, as the portal lists them
    #[serde(default)]
    posts: Vec<ScrapedPost>,
}

#[derive(Debug, Clone, Deserialize)]
struct FixtureAccount {
    credential: String,
    #[serde(default)]
    subjects: Vec<FixtureSubject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PortalDump {
    #[serde(default)]
    accounts: HashMap<String, FixtureAccount>,
}

/// Session handle for a fixture login.
#[derive(Debug, Clone)]
pub struct FixtureSession {
    registration: String,
}

pub struct FixtureScraper {
    dump: PortalDump,
}

impl FixtureScraper {
    /// Load a portal dump from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            dump: serde_json::from_str(json)?,
        })
    }

    pub fn account_count(&self) -> usize {
        self.dump.accounts.len()
    }

    fn account(&self, session: &FixtureSession) -> Result<&FixtureAccount> {
        self.dump
            .accounts
            .get(&session.registration)
            .ok_or_else(|| AppError::scrape(&session.registration, "session has no account"))
    }
}

#[async_trait]
impl ScrapingService for FixtureScraper {
    type Session = FixtureSession;

    async fn login(&self, registration: &str, credential: &str) -> Result<FixtureSession> {
        match self.dump.accounts.get(registration) {
            Some(account) if account.credential == credential => Ok(FixtureSession {
                registration: registration.to_string(),
            }),
            Some(_) => Err(AppError::auth(registration, "invalid credential")),
            None => Err(AppError::auth(registration, "unknown account")),
        }
    }

    async fn logout(&self, _session: FixtureSession) -> Result<()> {
        Ok(())
    }

    async fn get_subjects(&self, session: &FixtureSession) -> Result<Vec<ScrapedSubject>> {
        Ok(self
            .account(session)?
            .subjects
            .iter()
            .map(|s| ScrapedSubject {
                name: s.name.clone(),
                crypto_id: s.crypto_id.clone(),
            })
            .collect())
    }

    async fn get_posts(
        &self,
        session: &FixtureSession,
        subject: &Subject,
    ) -> Result<Vec<ScrapedPost>> {
        Ok(self
            .account(session)?
            .subjects
            .iter()
            .find(|s| s.crypto_id.as_deref() == Some(subject.crypto_id.as_str()))
            .map(|s| s.posts.clone())
            .unwrap_or_default())
    }
}
