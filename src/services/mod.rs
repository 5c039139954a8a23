//! Collaborators the sync engine talks to.
//!
//! - Scraping (`ScrapingService`): portal login and page extraction
//! - Notification (`NotificationService`): best-effort delivery with retries
//!   (`RetryingNotifier` over a `MessageSender` such as `HttpSender`)
//! - Dispatch (`Dispatcher`): fire-and-forget fan-out on spawned tasks

mod dispatch;
mod fixture;
mod http;
mod notifier;

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ScrapedPost, ScrapedSubject, Subject};

pub use dispatch::Dispatcher;
pub use fixture::{FixtureScraper, FixtureSession};
pub use http::HttpSender;
pub use notifier::{LogSender, RetryingNotifier};

/// Portal access for a single authenticated user at a time.
#[async_trait]
pub trait ScrapingService: Send + Sync {
    /// Authenticated portal session. Not shared between users.
    type Session: Send + Sync;

    async fn login(&self, registration: &str, credential: &str) -> Result<Self::Session>;

    async fn logout(&self, session: Self::Session) -> Result<()>;

    /// Subjects listed for the logged-in user.
    async fn get_subjects(&self, session: &Self::Session) -> Result<Vec<ScrapedSubject>>;

    /// Posts of one subject, newest first as the portal lists them.
    async fn get_posts(&self, session: &Self::Session, subject: &Subject)
    -> Result<Vec<ScrapedPost>>;
}

/// Where a message goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Recipient {
    /// A single user, addressed by phone number
    Direct(String),
    /// A group channel
    Broadcast(String),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Direct(phone) => write!(f, "{phone}"),
            Recipient::Broadcast(channel) => write!(f, "channel {channel}"),
        }
    }
}

/// Best-effort message delivery. Never reports failure to the caller.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_to(&self, recipient: &Recipient, message: &str);
}

/// One delivery attempt to the messaging provider.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn deliver(&self, recipient: &Recipient, message: &str) -> Result<()>;
}
