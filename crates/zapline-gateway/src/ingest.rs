// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message ingestion pipeline.
//!
//! One orchestrator drives both directions through the same steps: validate,
//! resolve the phone entry, resolve the attachment, classify, persist,
//! notify. Attachment failures degrade to a remote reference; only missing
//! content and unknown outbound phones abort an ingest.

use std::sync::Arc;

use tracing::{debug, info};

use zapline_core::{
    resolve_message_type, AttachmentKind, Direction, Message, MessageStore, PhoneRegistry,
    ZaplineError,
};
use zapline_fetch::{AttachmentFetcher, AttachmentOutcome, FetchRequest};
use zapline_webhook::{DispatchOutcome, WebhookEvent, WebhookService};

/// One message to ingest, direction included.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub phone_number: String,
    pub direction: Direction,
    pub content: Option<String>,
    pub attachment_url: Option<String>,
    pub attachment_name: Option<String>,
    pub attachment_kind: Option<AttachmentKind>,
    pub attachment_size: Option<u64>,
}

/// What an accepted ingest produced.
#[derive(Debug)]
pub struct IngestReceipt {
    /// The persisted message.
    pub message: Message,
    /// How the attachment was resolved, when one was supplied.
    pub attachment_outcome: Option<AttachmentOutcome>,
    /// Whether the webhook was delivered or handed to the retry pool.
    /// Always false for inbound ingests, where notification is detached.
    pub webhook_sent: bool,
}

/// Drives a message from raw request to persisted row plus webhook event.
pub struct IngestionOrchestrator {
    store: Arc<dyn MessageStore>,
    registry: Arc<dyn PhoneRegistry>,
    fetcher: Arc<AttachmentFetcher>,
    webhook: Arc<WebhookService>,
}

impl IngestionOrchestrator {
    pub fn new(
        store: Arc<dyn MessageStore>,
        registry: Arc<dyn PhoneRegistry>,
        fetcher: Arc<AttachmentFetcher>,
        webhook: Arc<WebhookService>,
    ) -> Self {
        Self {
            store,
            registry,
            fetcher,
            webhook,
        }
    }

    pub fn registry(&self) -> &Arc<dyn PhoneRegistry> {
        &self.registry
    }

    pub fn webhook(&self) -> &Arc<WebhookService> {
        &self.webhook
    }

    /// Runs the full pipeline for one message.
    ///
    /// Outbound ingests wait for the immediate webhook attempt so the caller
    /// learns whether delivery happened; inbound ingests detach it.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReceipt, ZaplineError> {
        if request.content.as_deref().is_none_or(str::is_empty)
            && request.attachment_url.as_deref().is_none_or(str::is_empty)
        {
            return Err(ZaplineError::Validation(
                "either message content or an attachment URL is required".to_string(),
            ));
        }
        if request.phone_number.trim().is_empty() {
            return Err(ZaplineError::Validation(
                "phone_number is required".to_string(),
            ));
        }

        // Inbound traffic registers unknown numbers; outbound traffic may
        // only address numbers the registry already knows.
        let phone = match request.direction {
            Direction::Inbound => self.registry.get_or_create(&request.phone_number).await?,
            Direction::Outbound => self
                .registry
                .get(&request.phone_number)
                .await?
                .ok_or_else(|| ZaplineError::PhoneNotFound(request.phone_number.clone()))?,
        };

        let (attachment, attachment_outcome) = match request
            .attachment_url
            .as_deref()
            .filter(|u| !u.is_empty())
        {
            Some(url) => {
                let (reference, outcome) = self
                    .fetcher
                    .resolve(FetchRequest {
                        url: url.to_string(),
                        name: request.attachment_name.clone(),
                        kind_hint: request.attachment_kind,
                        size_hint: request.attachment_size,
                    })
                    .await;
                (Some(reference), Some(outcome))
            }
            None => (None, None),
        };

        let message_type = resolve_message_type(request.direction, phone.ai_active);
        let message = self
            .store
            .append(Message::new(
                phone.number.clone(),
                request.content.clone(),
                message_type,
                attachment,
            ))
            .await?;

        info!(
            phone = %message.phone_number,
            message_type = message.message_type.as_str(),
            has_attachment = message.attachment.is_some(),
            "message ingested"
        );

        let event = WebhookEvent::message_created(&message, phone.ai_active);
        let webhook_sent = match request.direction {
            Direction::Outbound => {
                let outcome = self.webhook.notify(event).await;
                self.counts_as_sent(&outcome)
            }
            Direction::Inbound => {
                let webhook = self.webhook.clone();
                tokio::spawn(async move {
                    webhook.notify(event).await;
                });
                false
            }
        };

        Ok(IngestReceipt {
            message,
            attachment_outcome,
            webhook_sent,
        })
    }

    /// Flips the AI toggle for a phone id, emitting an `ai_toggle` event.
    pub async fn toggle_ai(&self, phone_id: &str) -> Result<zapline_core::PhoneEntry, ZaplineError> {
        let current = self
            .registry
            .get_by_id(phone_id)
            .await?
            .ok_or_else(|| ZaplineError::PhoneNotFound(phone_id.to_string()))?;

        let updated = self
            .registry
            .set_ai_active(phone_id, !current.ai_active)
            .await?
            .ok_or_else(|| ZaplineError::PhoneNotFound(phone_id.to_string()))?;

        debug!(phone = %updated.number, ai_active = updated.ai_active, "AI toggle flipped");

        let event = WebhookEvent::ai_toggled(&updated.number, current.ai_active, updated.ai_active);
        let webhook = self.webhook.clone();
        tokio::spawn(async move {
            webhook.notify(event).await;
        });

        Ok(updated)
    }

    /// Delivered counts, and so does a retryable failure while the breaker
    /// is still closed (the retry pool now owns it).
    fn counts_as_sent(&self, outcome: &DispatchOutcome) -> bool {
        match outcome {
            DispatchOutcome::Delivered => true,
            DispatchOutcome::Failed(reason) => {
                reason.is_retryable() && !self.webhook.breaker_snapshot().open
            }
            DispatchOutcome::Skipped(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zapline_config::{AttachmentConfig, WebhookConfig};
    use zapline_core::MessageType;
    use zapline_storage::{InMemoryMessageStore, InMemoryPhoneRegistry};

    fn orchestrator(
        upload_dir: &TempDir,
        webhook_url: Option<String>,
    ) -> (IngestionOrchestrator, Arc<InMemoryMessageStore>) {
        let store = Arc::new(InMemoryMessageStore::new());
        let registry = Arc::new(InMemoryPhoneRegistry::new());
        let attachment_config = AttachmentConfig {
            upload_dir: upload_dir.path().display().to_string(),
            ..AttachmentConfig::default()
        };
        let fetcher = Arc::new(
            AttachmentFetcher::new(&attachment_config, "http://localhost:5000").unwrap(),
        );
        let webhook_config = WebhookConfig {
            url: webhook_url,
            timeout_secs: 2,
            retry_delay_secs: 0,
            ..WebhookConfig::default()
        };
        let webhook = Arc::new(WebhookService::new(&webhook_config).unwrap());
        (
            IngestionOrchestrator::new(store.clone(), registry, fetcher, webhook),
            store,
        )
    }

    fn text_request(direction: Direction, content: &str) -> IngestRequest {
        IngestRequest {
            phone_number: "+5511999999999".to_string(),
            direction,
            content: Some(content.to_string()),
            attachment_url: None,
            attachment_name: None,
            attachment_kind: None,
            attachment_size: None,
        }
    }

    #[tokio::test]
    async fn empty_ingest_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir, None);
        let mut request = text_request(Direction::Inbound, "hi");
        request.content = None;
        let err = orchestrator.ingest(request).await.unwrap_err();
        assert!(matches!(err, ZaplineError::Validation(_)));
    }

    #[tokio::test]
    async fn inbound_registers_unknown_phone_as_lead() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, store) = orchestrator(&dir, None);

        let receipt = orchestrator
            .ingest(text_request(Direction::Inbound, "hello"))
            .await
            .unwrap();
        assert_eq!(receipt.message.message_type, MessageType::Lead);
        assert!(receipt.attachment_outcome.is_none());
        assert!(!receipt.webhook_sent);

        let stored = store.list_for_phone("+5511999999999").await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn outbound_to_unknown_phone_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir, None);
        let err = orchestrator
            .ingest(text_request(Direction::Outbound, "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ZaplineError::PhoneNotFound(_)));
    }

    #[tokio::test]
    async fn outbound_type_follows_ai_toggle() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir, None);
        let phone = orchestrator
            .registry()
            .get_or_create("+5511999999999")
            .await
            .unwrap();

        let receipt = orchestrator
            .ingest(text_request(Direction::Outbound, "agent reply"))
            .await
            .unwrap();
        assert_eq!(receipt.message.message_type, MessageType::User);

        orchestrator
            .registry()
            .set_ai_active(&phone.id, true)
            .await
            .unwrap();
        let receipt = orchestrator
            .ingest(text_request(Direction::Outbound, "bot reply"))
            .await
            .unwrap();
        assert_eq!(receipt.message.message_type, MessageType::Ai);
    }

    #[tokio::test]
    async fn unreachable_attachment_degrades_to_remote_reference() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir, None);

        let mut request = text_request(Direction::Inbound, "");
        request.content = None;
        request.attachment_url = Some("http://127.0.0.1:1/file.jpg".to_string());
        let receipt = orchestrator.ingest(request).await.unwrap();

        let attachment = receipt.message.attachment.unwrap();
        assert!(!attachment.downloaded);
        assert_eq!(attachment.url, "http://127.0.0.1:1/file.jpg");
        assert!(matches!(
            receipt.attachment_outcome,
            Some(AttachmentOutcome::KeptRemote(_))
        ));
    }

    #[tokio::test]
    async fn outbound_ingest_reports_webhook_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "event_type": "message",
                "message_type": "user"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir, Some(server.uri()));
        orchestrator
            .registry()
            .get_or_create("+5511999999999")
            .await
            .unwrap();

        let receipt = orchestrator
            .ingest(text_request(Direction::Outbound, "agent reply"))
            .await
            .unwrap();
        assert!(receipt.webhook_sent);
        server.verify().await;
    }

    #[tokio::test]
    async fn toggle_ai_flips_and_persists() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir, None);
        let phone = orchestrator
            .registry()
            .get_or_create("+5511999999999")
            .await
            .unwrap();
        assert!(!phone.ai_active);

        let updated = orchestrator.toggle_ai(&phone.id).await.unwrap();
        assert!(updated.ai_active);
        let updated = orchestrator.toggle_ai(&phone.id).await.unwrap();
        assert!(!updated.ai_active);
    }

    #[tokio::test]
    async fn toggle_ai_unknown_id_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir, None);
        let err = orchestrator.toggle_ai("missing").await.unwrap_err();
        assert!(matches!(err, ZaplineError::PhoneNotFound(_)));
    }
}
