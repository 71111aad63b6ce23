// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./zapline.toml` > `~/.config/zapline/zapline.toml`
//! > `/etc/zapline/zapline.toml`, with environment variable overrides via the
//! `ZAPLINE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ZaplineConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/zapline/zapline.toml` (system-wide)
/// 3. `~/.config/zapline/zapline.toml` (user XDG config)
/// 4. `./zapline.toml` (local directory)
/// 5. `ZAPLINE_*` environment variables
pub fn load_config() -> Result<ZaplineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ZaplineConfig::default()))
        .merge(Toml::file("/etc/zapline/zapline.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("zapline/zapline.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("zapline.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<ZaplineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ZaplineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ZaplineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ZaplineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so underscore-containing
/// key names stay unambiguous: `ZAPLINE_WEBHOOK_RETRY_DELAY_SECS` must map to
/// `webhook.retry_delay_secs`, not `webhook.retry.delay.secs`.
fn env_provider() -> Env {
    Env::prefixed("ZAPLINE_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("webhook_", "webhook.", 1)
            .replacen("attachment_", "attachment.", 1);
        mapped.into()
    })
}
