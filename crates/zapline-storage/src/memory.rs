// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory implementations of the storage traits.
//!
//! The relational layer is an external collaborator; these dashmap-backed
//! stores implement the same boundary for the single-process service and for
//! tests. Per-phone message order is append order under the phone's map entry
//! lock.

use async_trait::async_trait;
use dashmap::DashMap;

use zapline_core::error::ZaplineError;
use zapline_core::traits::{MessageStore, PhoneRegistry};
use zapline_core::types::{Message, PhoneEntry};

/// Append-only in-memory message store keyed by phone number.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    by_phone: DashMap<String, Vec<Message>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: Message) -> Result<Message, ZaplineError> {
        self.by_phone
            .entry(message.phone_number.clone())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_for_phone(&self, number: &str) -> Result<Vec<Message>, ZaplineError> {
        Ok(self
            .by_phone
            .get(number)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }
}

/// In-memory phone registry keyed by number, with a secondary id index.
#[derive(Debug, Default)]
pub struct InMemoryPhoneRegistry {
    by_number: DashMap<String, PhoneEntry>,
    number_by_id: DashMap<String, String>,
}

impl InMemoryPhoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PhoneRegistry for InMemoryPhoneRegistry {
    async fn get(&self, number: &str) -> Result<Option<PhoneEntry>, ZaplineError> {
        Ok(self.by_number.get(number).map(|entry| entry.clone()))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<PhoneEntry>, ZaplineError> {
        let Some(number) = self.number_by_id.get(id).map(|n| n.clone()) else {
            return Ok(None);
        };
        Ok(self.by_number.get(&number).map(|entry| entry.clone()))
    }

    async fn get_or_create(&self, number: &str) -> Result<PhoneEntry, ZaplineError> {
        let entry = self
            .by_number
            .entry(number.to_string())
            .or_insert_with(|| PhoneEntry::new(number.to_string()))
            .clone();
        self.number_by_id
            .insert(entry.id.clone(), entry.number.clone());
        Ok(entry)
    }

    async fn set_ai_active(
        &self,
        id: &str,
        active: bool,
    ) -> Result<Option<PhoneEntry>, ZaplineError> {
        let Some(number) = self.number_by_id.get(id).map(|n| n.clone()) else {
            return Ok(None);
        };
        let Some(mut entry) = self.by_number.get_mut(&number) else {
            return Ok(None);
        };
        entry.ai_active = active;
        Ok(Some(entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zapline_core::types::MessageType;

    #[tokio::test]
    async fn append_preserves_per_phone_order() {
        let store = InMemoryMessageStore::new();
        for i in 0..5 {
            let msg = Message::new(
                "+5511999999999".into(),
                Some(format!("msg {i}")),
                MessageType::Lead,
                None,
            );
            store.append(msg).await.unwrap();
        }
        let listed = store.list_for_phone("+5511999999999").await.unwrap();
        let contents: Vec<_> = listed
            .iter()
            .map(|m| m.content.clone().unwrap())
            .collect();
        assert_eq!(contents, vec!["msg 0", "msg 1", "msg 2", "msg 3", "msg 4"]);
    }

    #[tokio::test]
    async fn unknown_phone_lists_empty() {
        let store = InMemoryMessageStore::new();
        assert!(store.list_for_phone("+000").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let registry = InMemoryPhoneRegistry::new();
        let first = registry.get_or_create("+5511988887777").await.unwrap();
        let second = registry.get_or_create("+5511988887777").await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(!first.ai_active);
    }

    #[tokio::test]
    async fn set_ai_active_round_trips_through_id_index() {
        let registry = InMemoryPhoneRegistry::new();
        let entry = registry.get_or_create("+5511988887777").await.unwrap();

        let updated = registry
            .set_ai_active(&entry.id, true)
            .await
            .unwrap()
            .expect("entry should exist");
        assert!(updated.ai_active);

        let fetched = registry.get_by_id(&entry.id).await.unwrap().unwrap();
        assert!(fetched.ai_active);
        assert!(registry.set_ai_active("missing", true).await.unwrap().is_none());
    }
}
