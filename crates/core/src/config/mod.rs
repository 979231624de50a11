//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TETHER_*)
//! 2. TOML config file (if TETHER_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! One deployed build is described by `version` plus the strategy tables
//! (`bypass_prefixes`, `asset_prefixes`, `media_prefixes`). Bumping the
//! version is all a deploy needs to roll the cache generations.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TETHER_*, `__` separates nested keys)
/// 2. TOML config file (if TETHER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via TETHER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin of the application the agent is embedded in.
    ///
    /// Manifest paths, the offline page and the notification root resolve
    /// against it. Set via TETHER_ORIGIN.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Build version tag; names the current cache generations.
    ///
    /// Set via TETHER_VERSION.
    #[serde(default = "default_version")]
    pub version: String,

    /// Optional prefix prepended to generation names.
    #[serde(default)]
    pub cache_prefix: String,

    /// Application shell precached into the static generation at install.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Page served when a navigation fails with no network.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Path prefixes that are never intercepted (real-time channels, APIs).
    #[serde(default = "default_bypass_prefixes")]
    pub bypass_prefixes: Vec<String>,

    /// Build-output asset prefixes, served network-first with the MIME guard.
    #[serde(default = "default_asset_prefixes")]
    pub asset_prefixes: Vec<String>,

    /// Uploaded-media prefixes, served cache-first.
    #[serde(default = "default_media_prefixes")]
    pub media_prefixes: Vec<String>,

    /// Only intercept requests to `origin`; everything else bypasses.
    #[serde(default = "default_true")]
    pub same_origin_only: bool,

    /// Reject HTML bodies served for script requests.
    #[serde(default = "default_true")]
    pub mime_guard: bool,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via TETHER_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via TETHER_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via TETHER_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub notification: NotificationConfig,

    #[serde(default)]
    pub replay: ReplayConfig,
}

/// Presentation of notifications rendered from push payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notification_title")]
    pub title: String,
    #[serde(default = "default_notification_icon")]
    pub icon: String,
    #[serde(default = "default_notification_badge")]
    pub badge: String,
    /// Body used when a push arrives without text.
    #[serde(default = "default_notification_body")]
    pub default_body: String,
}

/// Offline mutation replay policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Background sync tag that triggers a queue drain.
    ///
    /// Set via TETHER_REPLAY__SYNC_TAG.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// First retry delay after a rejected replay.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Retry delay ceiling.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./tether-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_version() -> String {
    "v1".into()
}

fn default_manifest() -> Vec<String> {
    vec!["/".into(), "/offline.html".into(), "/manifest.json".into()]
}

fn default_offline_page() -> String {
    "/offline.html".into()
}

fn default_bypass_prefixes() -> Vec<String> {
    vec!["/api/".into(), "/socket.io/".into(), "/ws/".into(), "/realtime/".into()]
}

fn default_asset_prefixes() -> Vec<String> {
    vec!["/_next/static/".into(), "/assets/".into()]
}

fn default_media_prefixes() -> Vec<String> {
    vec!["/uploads/".into(), "/media/".into()]
}

fn default_user_agent() -> String {
    "tether/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

fn default_notification_title() -> String {
    "Tether".into()
}

fn default_notification_icon() -> String {
    "/icons/icon-192.png".into()
}

fn default_notification_badge() -> String {
    "/icons/badge-72.png".into()
}

fn default_notification_body() -> String {
    "You have a new notification".into()
}

fn default_sync_tag() -> String {
    "sync-mutations".into()
}

fn default_backoff_base_ms() -> u64 {
    5_000
}

fn default_backoff_max_ms() -> u64 {
    3_600_000 // 1h
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: default_notification_title(),
            icon: default_notification_icon(),
            badge: default_notification_badge(),
            default_body: default_notification_body(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            sync_tag: default_sync_tag(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl ReplayConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            version: default_version(),
            cache_prefix: String::new(),
            manifest: default_manifest(),
            offline_page: default_offline_page(),
            bypass_prefixes: default_bypass_prefixes(),
            asset_prefixes: default_asset_prefixes(),
            media_prefixes: default_media_prefixes(),
            same_origin_only: true,
            mime_guard: true,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            notification: NotificationConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TETHER_`
    /// 2. TOML file from `TETHER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TETHER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment.merge(
            Env::prefixed("TETHER_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        ))
    }

    /// Extract and validate a config from an already layered figment.
    pub fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
