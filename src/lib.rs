//! Portal notifier library
//!
//! Keeps an in-memory snapshot of every persisted user, subject, enrollment
//! and announcement, re-scrapes the academic portal once per cycle, persists
//! only what changed and notifies enrolled users of new announcements.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod snapshot;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod test_utils;
