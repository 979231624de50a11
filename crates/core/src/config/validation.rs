//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn check_paths(field: &str, paths: &[String]) -> Result<(), ConfigError> {
    if let Some(bad) = paths.iter().find(|p| !p.starts_with('/')) {
        return Err(invalid(field, format!("'{bad}' must be an absolute path starting with '/'")));
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `version` is empty or contains whitespace
    /// - `origin` is not an absolute http(s) URL
    /// - `manifest` is empty, has relative or duplicate entries
    /// - any prefix list contains a relative path
    /// - replay backoff base exceeds its ceiling
    ///
    /// Returns `ConfigError::Missing` if `offline_page` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.version.is_empty() || self.version.chars().any(char::is_whitespace) {
            return Err(invalid("version", "must be non-empty and contain no whitespace"));
        }
        if self.cache_prefix.chars().any(char::is_whitespace) {
            return Err(invalid("cache_prefix", "must not contain whitespace"));
        }

        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") && origin.has_host() => {}
            Ok(origin) => return Err(invalid("origin", format!("unsupported origin: {origin}"))),
            Err(e) => return Err(invalid("origin", e.to_string())),
        }

        if self.manifest.is_empty() {
            return Err(invalid("manifest", "must list at least one path"));
        }
        check_paths("manifest", &self.manifest)?;
        let mut seen = HashSet::new();
        if let Some(dup) = self.manifest.iter().find(|p| !seen.insert(p.as_str())) {
            return Err(invalid("manifest", format!("duplicate entry '{dup}'")));
        }

        if self.offline_page.is_empty() {
            return Err(ConfigError::Missing {
                field: "offline_page".into(),
                hint: "Set TETHER_OFFLINE_PAGE to the offline fallback route".into(),
            });
        }
        check_paths("offline_page", std::slice::from_ref(&self.offline_page))?;

        check_paths("bypass_prefixes", &self.bypass_prefixes)?;
        check_paths("asset_prefixes", &self.asset_prefixes)?;
        check_paths("media_prefixes", &self.media_prefixes)?;

        if self.replay.sync_tag.is_empty() {
            return Err(invalid("replay.sync_tag", "must not be empty"));
        }
        if self.replay.backoff_base_ms == 0 {
            return Err(invalid("replay.backoff_base_ms", "must be greater than 0"));
        }
        if self.replay.backoff_base_ms > self.replay.backoff_max_ms {
            return Err(invalid("replay.backoff_base_ms", "must not exceed replay.backoff_max_ms"));
        }

        if !self.manifest.contains(&self.offline_page) {
            tracing::warn!(
                offline_page = %self.offline_page,
                "offline_page is not in the manifest; navigations will fall back to a synthesized 503"
            );
        }

        Ok(())
    }
}
