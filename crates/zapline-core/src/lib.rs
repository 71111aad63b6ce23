// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types, errors, and adapter traits for the Zapline message relay.
//!
//! Zapline ingests messages and attachments for phone-number-scoped
//! conversations and relays them to an external automation endpoint. This
//! crate holds the shared vocabulary: the [`Message`] model, the
//! [`ZaplineError`] taxonomy, and the storage traits the rest of the
//! workspace binds to.

pub mod error;
pub mod traits;
pub mod types;

pub use error::ZaplineError;
pub use traits::{MessageStore, PhoneRegistry};
pub use types::{
    resolve_message_type, AttachmentKind, AttachmentReference, Direction, Message, MessageType,
    PhoneEntry, DEFAULT_ATTACHMENT_NAME,
};
