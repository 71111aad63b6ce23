// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Zapline message relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Zapline configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ZaplineConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Webhook delivery and reliability settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Attachment ingestion settings.
    #[serde(default)]
    pub attachment: AttachmentConfig,
}

impl ZaplineConfig {
    /// Validates cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be non-zero".into());
        }
        if !(5..=30).contains(&self.attachment.fetch_timeout_secs) {
            return Err(format!(
                "attachment.fetch_timeout_secs must be within 5-30, got {}",
                self.attachment.fetch_timeout_secs
            ));
        }
        if self.webhook.breaker_threshold == 0 {
            return Err("webhook.breaker_threshold must be at least 1".into());
        }
        if self.webhook.retry_workers == 0 {
            return Err("webhook.retry_workers must be at least 1".into());
        }
        if self.webhook.retry_queue_size == 0 {
            return Err("webhook.retry_queue_size must be at least 1".into());
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL used to build absolute attachment links.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: default_public_base_url(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_public_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Webhook delivery and reliability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Endpoint URL. Unset means delivery is skipped entirely.
    #[serde(default)]
    pub url: Option<String>,

    /// Per-attempt dispatch timeout. Deliberately short: the request path
    /// must never block materially on webhook latency.
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,

    /// Background retries after a failed immediate attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed spacing between background retry attempts.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Consecutive failures before the circuit breaker opens.
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,

    /// How long the breaker stays open before the next probe is allowed.
    #[serde(default = "default_breaker_cooldown_secs")]
    pub breaker_cooldown_secs: u64,

    /// Fixed worker pool size for background retries.
    #[serde(default = "default_retry_workers")]
    pub retry_workers: usize,

    /// Bounded retry queue capacity; overflow drops the task.
    #[serde(default = "default_retry_queue_size")]
    pub retry_queue_size: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_webhook_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            breaker_threshold: default_breaker_threshold(),
            breaker_cooldown_secs: default_breaker_cooldown_secs(),
            retry_workers: default_retry_workers(),
            retry_queue_size: default_retry_queue_size(),
        }
    }
}

fn default_webhook_timeout_secs() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_breaker_threshold() -> u32 {
    5
}

fn default_breaker_cooldown_secs() -> u64 {
    60
}

fn default_retry_workers() -> usize {
    2
}

fn default_retry_queue_size() -> usize {
    64
}

/// Attachment ingestion configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AttachmentConfig {
    /// Directory where fetched and uploaded files are stored.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Byte-size ceiling for fetched and uploaded files.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Remote fetch deadline. Independent of the dispatch timeout.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// URL prefix identifying references that are already local.
    #[serde(default = "default_local_prefix")]
    pub local_prefix: String,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_bytes: default_max_bytes(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            local_prefix: default_local_prefix(),
        }
    }
}

fn default_upload_dir() -> String {
    "static/uploads".to_string()
}

fn default_max_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_local_prefix() -> String {
    "/chat/uploads/".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ZaplineConfig::default();
        config.validate().expect("defaults should validate");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.webhook.timeout_secs, 5);
        assert_eq!(config.webhook.breaker_threshold, 5);
        assert_eq!(config.webhook.breaker_cooldown_secs, 60);
        assert_eq!(config.attachment.max_bytes, 50 * 1024 * 1024);
        assert!(config.webhook.url.is_none());
    }

    #[test]
    fn fetch_timeout_range_is_enforced() {
        let mut config = ZaplineConfig::default();
        config.attachment.fetch_timeout_secs = 3;
        assert!(config.validate().is_err());
        config.attachment.fetch_timeout_secs = 31;
        assert!(config.validate().is_err());
        config.attachment.fetch_timeout_secs = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut config = ZaplineConfig::default();
        config.webhook.breaker_threshold = 0;
        assert!(config.validate().is_err());
    }
}
