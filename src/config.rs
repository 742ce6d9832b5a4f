//! Configuration types for mail-harvest

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Harvesting pipeline settings (concurrency, channels, scratch space)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Maximum remote calls in flight per fan-out stage (default: 16)
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Capacity of the channels between stages (default: 64)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Directory where request archives are written (default: system temp dir)
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            channel_capacity: default_channel_capacity(),
            archive_dir: default_archive_dir(),
        }
    }
}

/// Mail service (Gmail REST) settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MailApiConfig {
    /// API root (default: "https://gmail.googleapis.com")
    #[serde(default = "default_mail_base_url")]
    pub base_url: String,

    /// Mailbox owner, "me" for the authenticated user
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Timeout for a single API call (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for MailApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_mail_base_url(),
            user_id: default_user_id(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 0.0.0.0:4747)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

/// Main configuration for the harvester and its HTTP surface
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Pipeline settings
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Mail service settings
    #[serde(default)]
    pub mail: MailApiConfig,

    /// HTTP server settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Build a config from process environment variables, falling back to defaults.
    ///
    /// Recognised variables: `PORT`, `HARVEST_ARCHIVE_DIR`,
    /// `HARVEST_MAX_CONCURRENCY`, `HARVEST_CHANNEL_CAPACITY`, `GMAIL_API_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (see [`Config::from_env`]).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(port) = lookup("PORT") {
            let port: u16 = parse_setting("PORT", &port)?;
            config.api.bind_address = SocketAddr::from(([0, 0, 0, 0], port));
        } else {
            tracing::info!(
                port = DEFAULT_PORT,
                "No PORT environment variable detected, using default"
            );
        }
        if let Some(dir) = lookup("HARVEST_ARCHIVE_DIR") {
            config.harvest.archive_dir = PathBuf::from(dir);
        }
        if let Some(limit) = lookup("HARVEST_MAX_CONCURRENCY") {
            config.harvest.max_concurrent_requests =
                parse_setting("HARVEST_MAX_CONCURRENCY", &limit)?;
        }
        if let Some(capacity) = lookup("HARVEST_CHANNEL_CAPACITY") {
            config.harvest.channel_capacity = parse_setting("HARVEST_CHANNEL_CAPACITY", &capacity)?;
        }
        if let Some(base_url) = lookup("GMAIL_API_BASE_URL") {
            config.mail.base_url = base_url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check settings that serde defaults cannot guarantee.
    pub fn validate(&self) -> Result<()> {
        if self.harvest.max_concurrent_requests == 0 {
            return Err(Error::Config {
                message: "max_concurrent_requests must be at least 1".to_string(),
                key: Some("max_concurrent_requests".to_string()),
            });
        }
        if self.harvest.channel_capacity == 0 {
            return Err(Error::Config {
                message: "channel_capacity must be at least 1".to_string(),
                key: Some("channel_capacity".to_string()),
            });
        }
        let base = url::Url::parse(&self.mail.base_url).map_err(|e| Error::Config {
            message: format!("invalid mail API base URL {}: {}", self.mail.base_url, e),
            key: Some("base_url".to_string()),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!("unsupported mail API scheme: {}", base.scheme()),
                key: Some("base_url".to_string()),
            });
        }
        validate_archive_dir(&self.harvest.archive_dir)?;
        if self.mail.user_id.is_empty() {
            return Err(Error::Config {
                message: "user_id must not be empty".to_string(),
                key: Some("user_id".to_string()),
            });
        }
        Ok(())
    }
}

/// The archive directory must exist, be a directory and be writable.
fn validate_archive_dir(dir: &std::path::Path) -> Result<()> {
    let invalid = |message: String| Error::Config {
        message,
        key: Some("archive_dir".to_string()),
    };
    let metadata = std::fs::metadata(dir).map_err(|e| {
        invalid(format!("archive directory {} is not accessible: {}", dir.display(), e))
    })?;
    if !metadata.is_dir() {
        return Err(invalid(format!(
            "archive directory {} is not a directory",
            dir.display()
        )));
    }
    if metadata.permissions().readonly() {
        return Err(invalid(format!(
            "archive directory {} is read-only",
            dir.display()
        )));
    }
    Ok(())
}

fn parse_setting<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| Error::Config {
        message: format!("invalid value {:?} for {}: {}", raw, key, e),
        key: Some(key.to_string()),
    })
}

const DEFAULT_PORT: u16 = 4747;

fn default_max_concurrent_requests() -> usize {
    16
}

fn default_channel_capacity() -> usize {
    64
}

fn default_archive_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_mail_base_url() -> String {
    "https://gmail.googleapis.com".to_string()
}

fn default_user_id() -> String {
    "me".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}
