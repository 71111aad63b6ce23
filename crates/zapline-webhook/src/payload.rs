// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound webhook payload model.
//!
//! Every event carries the envelope fields (`event_type`, `phone_number`,
//! `timestamp`) plus message and attachment details. Fields with no value
//! serialize as explicit nulls so downstream automations see a stable shape.

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use zapline_core::types::Message;

/// Structured webhook event payload.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    pub event_type: String,
    pub phone_number: String,
    /// RFC 3339 emission timestamp.
    pub timestamp: String,
    pub message: Option<String>,
    pub attachment_url: Option<String>,
    pub attachment_full_url: Option<String>,
    pub attachment_name: Option<String>,
    pub attachment_type: Option<String>,
    pub attachment_size: Option<u64>,
    pub message_id: Option<String>,
    pub message_type: Option<String>,
    pub ai_active: Option<bool>,
    /// Event-specific fields (e.g. previous/new status for `ai_toggle`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WebhookEvent {
    /// Builds a `message` event for a newly created message.
    pub fn message_created(message: &Message, ai_active: bool) -> Self {
        let attachment = message.attachment.as_ref();
        Self {
            event_type: "message".to_string(),
            phone_number: message.phone_number.clone(),
            timestamp: Utc::now().to_rfc3339(),
            message: message.content.clone(),
            attachment_url: attachment.map(|a| a.url.clone()),
            attachment_full_url: attachment.map(|a| a.full_url.clone()),
            attachment_name: attachment.map(|a| a.name.clone()),
            attachment_type: attachment.map(|a| a.kind.as_str().to_string()),
            attachment_size: attachment.and_then(|a| a.size),
            message_id: Some(message.id.clone()),
            message_type: Some(message.message_type.as_str().to_string()),
            ai_active: Some(ai_active),
            extra: Map::new(),
        }
    }

    /// Builds an `ai_toggle` event for an AI status change.
    pub fn ai_toggled(phone_number: &str, previous: bool, new: bool) -> Self {
        let mut extra = Map::new();
        extra.insert("previous_status".to_string(), Value::Bool(previous));
        extra.insert("new_status".to_string(), Value::Bool(new));
        Self {
            event_type: "ai_toggle".to_string(),
            phone_number: phone_number.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            message: None,
            attachment_url: None,
            attachment_full_url: None,
            attachment_name: None,
            attachment_type: None,
            attachment_size: None,
            message_id: None,
            message_type: None,
            ai_active: Some(new),
            extra,
        }
    }

    /// Validates the envelope and serializes the payload.
    ///
    /// A failure here is a local bug, not a network failure: it is reported
    /// distinctly and never retried.
    pub fn to_body(&self) -> Result<String, String> {
        if self.event_type.is_empty() {
            return Err("missing event_type".to_string());
        }
        if self.timestamp.is_empty() {
            return Err("missing timestamp".to_string());
        }
        // Minimum reasonable phone length; anything shorter is malformed input
        // that an automation endpoint cannot route.
        if self.phone_number.len() < 8 {
            return Err(format!("invalid phone number: {:?}", self.phone_number));
        }
        serde_json::to_string(self).map_err(|e| format!("payload serialization failed: {e}"))
    }
}
