//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Portal and per-user pacing settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Notification delivery settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Snapshot recovery settings
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Cycle scheduling settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Local storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.sync.portal_base_url).map_err(|e| {
            AppError::validation(format!(
                "sync.portal_base_url '{}' is not a valid URL: {e}",
                self.sync.portal_base_url
            ))
        })?;
        if self.notifier.max_attempts == 0 {
            return Err(AppError::validation("notifier.max_attempts must be > 0"));
        }
        if self.notifier.max_in_flight == 0 {
            return Err(AppError::validation("notifier.max_in_flight must be > 0"));
        }
        if !self.notifier.message_template.contains("{content}") {
            return Err(AppError::validation(
                "notifier.message_template must contain {content}",
            ));
        }
        if self.notifier.timeout_secs == 0 {
            return Err(AppError::validation("notifier.timeout_secs must be > 0"));
        }
        if self.recovery.max_attempts == 0 {
            return Err(AppError::validation("recovery.max_attempts must be > 0"));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(AppError::validation("scheduler.interval_secs must be > 0"));
        }
        if self.scheduler.resync_every == 0 {
            return Err(AppError::validation("scheduler.resync_every must be > 0"));
        }
        if self.scheduler.quiet_start_hour > 23 || self.scheduler.quiet_end_hour > 23 {
            return Err(AppError::validation(
                "scheduler quiet hours must be within 0..=23",
            ));
        }
        Ok(())
    }
}

/// Portal access and per-user pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL relative post links are resolved against
    #[serde(default = "defaults::portal_base_url")]
    pub portal_base_url: String,

    /// Delay between users in milliseconds
    #[serde(default = "defaults::user_delay")]
    pub user_delay_ms: u64,
}

impl SyncConfig {
    pub fn user_delay(&self) -> Duration {
        Duration::from_millis(self.user_delay_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            portal_base_url: defaults::portal_base_url(),
            user_delay_ms: defaults::user_delay(),
        }
    }
}

/// Notification delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Delivery attempts per message, including the first one
    #[serde(default = "defaults::delivery_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between delivery attempts in milliseconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,

    /// Delay after each announcement's fan-out in milliseconds
    #[serde(default = "defaults::notification_pacing")]
    pub pacing_ms: u64,

    /// Maximum deliveries in flight at once
    #[serde(default = "defaults::max_in_flight")]
    pub max_in_flight: usize,

    /// Message template, see `Announcement::format`
    #[serde(default = "defaults::message_template")]
    pub message_template: String,

    /// Channel that additionally receives every new announcement
    #[serde(default)]
    pub broadcast_channel: Option<String>,

    /// Messaging provider endpoint; messages are only logged when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl NotifierConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::delivery_attempts(),
            retry_delay_ms: defaults::retry_delay(),
            pacing_ms: defaults::notification_pacing(),
            max_in_flight: defaults::max_in_flight(),
            message_template: defaults::message_template(),
            broadcast_channel: None,
            endpoint: None,
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Snapshot recovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Consecutive resync attempts before giving up until a healthy cycle
    #[serde(default = "defaults::recovery_attempts")]
    pub max_attempts: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::recovery_attempts(),
        }
    }
}

/// Cycle scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between cycle ticks
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Executed cycles between scheduled full resyncs
    #[serde(default = "defaults::resync_every")]
    pub resync_every: u32,

    /// Local hour quiet hours begin (inclusive)
    #[serde(default = "defaults::quiet_start")]
    pub quiet_start_hour: u32,

    /// Local hour quiet hours end (exclusive)
    #[serde(default = "defaults::quiet_end")]
    pub quiet_end_hour: u32,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            resync_every: defaults::resync_every(),
            quiet_start_hour: defaults::quiet_start(),
            quiet_end_hour: defaults::quiet_end(),
        }
    }
}

/// Local storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Sync defaults
    pub fn portal_base_url() -> String {
        "https://portal.example.edu/".into()
    }
    pub fn user_delay() -> u64 {
        1000
    }

    // Notifier defaults
    pub fn delivery_attempts() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        2000
    }
    pub fn notification_pacing() -> u64 {
        3000
    }
    pub fn max_in_flight() -> usize {
        4
    }
    pub fn message_template() -> String {
        "Novo aviso em *{subject}*:\n\n{content}\n\n*Url:* {url}".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Recovery defaults
    pub fn recovery_attempts() -> u32 {
        3
    }

    // Scheduler defaults
    pub fn interval() -> u64 {
        120
    }
    pub fn resync_every() -> u32 {
        30
    }
    pub fn quiet_start() -> u32 {
        23
    }
    pub fn quiet_end() -> u32 {
        5
    }

    // Storage defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("storage")
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
}
