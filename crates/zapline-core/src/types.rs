// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Zapline workspace.
//!
//! A [`Message`] is one conversation turn scoped to a phone number. Messages
//! are created exactly once by the ingestion orchestrator and are immutable
//! thereafter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default display name when the source request names no attachment.
pub const DEFAULT_ATTACHMENT_NAME: &str = "attachment";

/// Stored message type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Received from an external/inbound source.
    Lead,
    /// Sent by a human operator while AI is inactive.
    User,
    /// Sent by this system while AI is active.
    Ai,
}

impl MessageType {
    /// The wire/storage tag for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Lead => "lead",
            MessageType::User => "user",
            MessageType::Ai => "ai",
        }
    }
}

/// Direction of a conversation turn relative to this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Arriving from an external source.
    Inbound,
    /// Sent from this system.
    Outbound,
}

/// Maps (direction, AI-toggle-state) to a stored message type.
///
/// Total over its inputs: inbound turns are always `lead` regardless of AI
/// state; outbound turns are `ai` when the phone's AI toggle is active and
/// `user` otherwise.
pub fn resolve_message_type(direction: Direction, ai_active: bool) -> MessageType {
    match direction {
        Direction::Inbound => MessageType::Lead,
        Direction::Outbound if ai_active => MessageType::Ai,
        Direction::Outbound => MessageType::User,
    }
}

/// Coarse attachment category inferred from filename or content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    Pdf,
    Document,
    /// Default when nothing matches.
    File,
}

impl AttachmentKind {
    /// The wire/storage tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "image",
            AttachmentKind::Video => "video",
            AttachmentKind::Audio => "audio",
            AttachmentKind::Pdf => "pdf",
            AttachmentKind::Document => "document",
            AttachmentKind::File => "file",
        }
    }

    /// Parses a caller-supplied category hint; unknown strings map to `File`.
    pub fn parse(tag: &str) -> AttachmentKind {
        match tag {
            "image" => AttachmentKind::Image,
            "video" => AttachmentKind::Video,
            "audio" => AttachmentKind::Audio,
            "pdf" => AttachmentKind::Pdf,
            "document" => AttachmentKind::Document,
            _ => AttachmentKind::File,
        }
    }
}

impl Default for AttachmentKind {
    fn default() -> Self {
        AttachmentKind::File
    }
}

/// Resolved description of a message's binary payload.
///
/// Display name and kind are never empty in a persisted record even when the
/// source request omitted them; the pipeline supplies defaults rather than
/// leaving gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentReference {
    /// Local path (under the upload prefix) or the retained external URL.
    pub url: String,
    /// Absolute URL built from the public base.
    pub full_url: String,
    /// Display name, defaulting to [`DEFAULT_ATTACHMENT_NAME`].
    pub name: String,
    /// Category tag, defaulting to [`AttachmentKind::File`].
    pub kind: AttachmentKind,
    /// Byte size; unknown is a valid state for remote fallbacks.
    pub size: Option<u64>,
    /// Whether the bytes were fetched into local storage.
    pub downloaded: bool,
}

/// One conversation turn.
///
/// Invariant: `content` is non-empty OR `attachment` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub id: String,
    /// Owning phone number.
    pub phone_number: String,
    /// Textual content; may be absent for attachment-only turns.
    pub content: Option<String>,
    /// Stored type tag.
    pub message_type: MessageType,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Resolved attachment reference, if any.
    pub attachment: Option<AttachmentReference>,
}

impl Message {
    /// Builds a new message with a fresh id and the current timestamp.
    pub fn new(
        phone_number: String,
        content: Option<String>,
        message_type: MessageType,
        attachment: Option<AttachmentReference>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            phone_number,
            content,
            message_type,
            created_at: Utc::now(),
            attachment,
        }
    }
}

/// A registered phone number and its AI toggle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneEntry {
    /// Registry-assigned identifier.
    pub id: String,
    /// The phone number itself.
    pub number: String,
    /// Whether automated (AI) responses are active for this number.
    pub ai_active: bool,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

impl PhoneEntry {
    /// Builds a new entry with AI inactive, matching registry defaults.
    pub fn new(number: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            number,
            ai_active: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_is_total_and_deterministic() {
        assert_eq!(
            resolve_message_type(Direction::Inbound, true),
            MessageType::Lead
        );
        assert_eq!(
            resolve_message_type(Direction::Inbound, false),
            MessageType::Lead
        );
        assert_eq!(
            resolve_message_type(Direction::Outbound, true),
            MessageType::Ai
        );
        assert_eq!(
            resolve_message_type(Direction::Outbound, false),
            MessageType::User
        );
    }

    #[test]
    fn message_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&MessageType::Lead).unwrap(),
            "\"lead\""
        );
        assert_eq!(serde_json::to_string(&MessageType::Ai).unwrap(), "\"ai\"");
    }

    #[test]
    fn attachment_kind_round_trips_known_tags() {
        for tag in ["image", "video", "audio", "pdf", "document", "file"] {
            assert_eq!(AttachmentKind::parse(tag).as_str(), tag);
        }
        assert_eq!(AttachmentKind::parse("spreadsheet"), AttachmentKind::File);
    }

    #[test]
    fn new_message_gets_unique_ids() {
        let a = Message::new("+5511999999999".into(), Some("hi".into()), MessageType::Lead, None);
        let b = Message::new("+5511999999999".into(), Some("hi".into()), MessageType::Lead, None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn phone_entry_defaults_ai_inactive() {
        let entry = PhoneEntry::new("+5511988887777".into());
        assert!(!entry.ai_active);
    }
}
