// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Zapline message relay.

use thiserror::Error;

/// The primary error type used across Zapline crates.
///
/// Only [`ZaplineError::Validation`] and [`ZaplineError::PhoneNotFound`]
/// surface to HTTP callers as failures; everything else is absorbed into a
/// degraded-but-successful record or a background-only retry. The product
/// guarantee is "the caller's message is never lost", not "the webhook
/// always succeeds immediately".
#[derive(Debug, Error)]
pub enum ZaplineError {
    /// Request is missing both textual content and an attachment URL.
    #[error("validation error: {0}")]
    Validation(String),

    /// Outbound send targeted a phone number that is not registered.
    #[error("phone number not found: {0}")]
    PhoneNotFound(String),

    /// Configuration errors (invalid TOML, missing required fields, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (persistence failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
