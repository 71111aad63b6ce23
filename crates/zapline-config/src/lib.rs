// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for the Zapline message relay.
//!
//! TOML files merged across the XDG hierarchy with `ZAPLINE_*` environment
//! overrides, extracted into [`model::ZaplineConfig`].

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{AttachmentConfig, ServerConfig, WebhookConfig, ZaplineConfig};

/// Loads configuration from the standard hierarchy and validates it.
pub fn load_and_validate() -> Result<ZaplineConfig, String> {
    let config = load_config().map_err(|e| e.to_string())?;
    config.validate()?;
    Ok(config)
}
