// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter traits for the message and phone-number collaborators.
//!
//! The relational schema and query layer are external concerns; Zapline only
//! binds to them through these traits. Implementations own their concurrency
//! control.

use async_trait::async_trait;

use crate::error::ZaplineError;
use crate::types::{Message, PhoneEntry};

/// Persistence boundary for messages.
///
/// Messages are append-only: created exactly once by the orchestrator,
/// immutable thereafter, and removed only when their owning phone number is
/// deleted (an external-collaborator concern).
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends a message; per-phone ordering follows call order.
    async fn append(&self, message: Message) -> Result<Message, ZaplineError>;

    /// Lists messages for a phone number in creation order.
    async fn list_for_phone(&self, number: &str) -> Result<Vec<Message>, ZaplineError>;
}

/// Registry of known phone numbers and their AI toggle state.
#[async_trait]
pub trait PhoneRegistry: Send + Sync {
    /// Looks up a phone number.
    async fn get(&self, number: &str) -> Result<Option<PhoneEntry>, ZaplineError>;

    /// Looks up a phone number by registry id.
    async fn get_by_id(&self, id: &str) -> Result<Option<PhoneEntry>, ZaplineError>;

    /// Returns the existing entry or registers a new one (AI inactive).
    async fn get_or_create(&self, number: &str) -> Result<PhoneEntry, ZaplineError>;

    /// Sets the AI toggle for a phone id; returns the updated entry.
    async fn set_ai_active(&self, id: &str, active: bool)
        -> Result<Option<PhoneEntry>, ZaplineError>;
}
