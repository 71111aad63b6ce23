// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the chat API.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use zapline_core::{AttachmentKind, Direction, Message, ZaplineError};
use zapline_fetch::classifier;
use zapline_fetch::AttachmentOutcome;
use zapline_webhook::{DispatchOutcome, SkipReason, WebhookEvent};

use crate::ingest::IngestRequest;
use crate::server::AppState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Converts domain errors into HTTP responses.
///
/// Only validation and unknown-phone errors are the caller's fault;
/// everything else is a 500 with the detail kept out of the body.
pub struct ApiError(pub ZaplineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self.0 {
            ZaplineError::Validation(detail) => (StatusCode::BAD_REQUEST, detail),
            ZaplineError::PhoneNotFound(number) => (
                StatusCode::NOT_FOUND,
                format!("phone number not found: {number}"),
            ),
            other => {
                warn!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<ZaplineError> for ApiError {
    fn from(err: ZaplineError) -> Self {
        ApiError(err)
    }
}

/// Request body shared by both message entry points.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub phone_number: String,
    /// Inbound callers send `message`, outbound callers send `content`.
    #[serde(default, alias = "content")]
    pub message: Option<String>,
    #[serde(default)]
    pub attachment_url: Option<String>,
    #[serde(default)]
    pub attachment_name: Option<String>,
    #[serde(default)]
    pub attachment_type: Option<String>,
    #[serde(default)]
    pub attachment_size: Option<u64>,
}

impl MessageRequest {
    fn into_ingest(self, direction: Direction) -> IngestRequest {
        IngestRequest {
            phone_number: self.phone_number,
            direction,
            content: self.message,
            attachment_url: self.attachment_url,
            attachment_name: self.attachment_name,
            attachment_kind: self.attachment_type.as_deref().map(AttachmentKind::parse),
            attachment_size: self.attachment_size,
        }
    }
}

/// Flat message view returned by the message endpoints.
///
/// Attachment fields are hoisted to the top level and the category is keyed
/// `type`, matching the shape webhook consumers already receive.
#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: String,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub message_type: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub attachment_url: Option<String>,
    pub attachment_full_url: Option<String>,
    pub attachment_name: Option<String>,
    pub attachment_type: Option<String>,
    pub attachment_size: Option<u64>,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        let attachment = message.attachment;
        Self {
            id: message.id,
            content: message.content,
            message_type: message.message_type.as_str().to_string(),
            created_at: message.created_at,
            attachment_url: attachment.as_ref().map(|a| a.url.clone()),
            attachment_full_url: attachment.as_ref().map(|a| a.full_url.clone()),
            attachment_name: attachment.as_ref().map(|a| a.name.clone()),
            attachment_type: attachment.as_ref().map(|a| a.kind.as_str().to_string()),
            attachment_size: attachment.as_ref().and_then(|a| a.size),
        }
    }
}

/// Response body for POST /chat/receive-message.
#[derive(Debug, Serialize)]
pub struct ReceiveMessageResponse {
    pub success: bool,
    pub message: MessageView,
    pub attachment_downloaded: bool,
    pub attachment_was_local: bool,
}

/// Response body for POST /chat/send-message.
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: MessageView,
    pub webhook_sent: bool,
}

/// POST /chat/receive-message
///
/// Inbound entry point: registers unknown phone numbers, resolves the
/// attachment, persists, and notifies the webhook in the background.
pub async fn receive_message(
    State(state): State<AppState>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<ReceiveMessageResponse>, ApiError> {
    let receipt = state
        .orchestrator
        .ingest(body.into_ingest(Direction::Inbound))
        .await?;

    let attachment_downloaded = receipt
        .message
        .attachment
        .as_ref()
        .is_some_and(|a| a.downloaded);
    let attachment_was_local = matches!(
        receipt.attachment_outcome,
        Some(AttachmentOutcome::AlreadyLocal)
    );

    Ok(Json(ReceiveMessageResponse {
        success: true,
        message: receipt.message.into(),
        attachment_downloaded,
        attachment_was_local,
    }))
}

/// POST /chat/send-message
///
/// Outbound entry point: the phone number must already be registered.
pub async fn send_message(
    State(state): State<AppState>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let receipt = state
        .orchestrator
        .ingest(body.into_ingest(Direction::Outbound))
        .await?;

    Ok(Json(SendMessageResponse {
        success: true,
        message: receipt.message.into(),
        webhook_sent: receipt.webhook_sent,
    }))
}

/// Response body for POST /chat/toggle-ai/{phone_id}.
#[derive(Debug, Serialize)]
pub struct ToggleAiResponse {
    pub success: bool,
    pub phone_number: String,
    pub ai_active: bool,
}

/// POST /chat/toggle-ai/{phone_id}
pub async fn toggle_ai(
    State(state): State<AppState>,
    Path(phone_id): Path<String>,
) -> Result<Json<ToggleAiResponse>, ApiError> {
    let updated = state.orchestrator.toggle_ai(&phone_id).await?;
    Ok(Json(ToggleAiResponse {
        success: true,
        phone_number: updated.number,
        ai_active: updated.ai_active,
    }))
}

/// Circuit breaker state as reported by the status endpoint.
#[derive(Debug, Serialize)]
pub struct CircuitStatus {
    pub open: bool,
    pub failure_count: u32,
    pub threshold: u32,
    pub cooldown_secs: u64,
    pub cooldown_remaining_secs: Option<u64>,
}

/// Response body for GET /chat/webhook-status.
#[derive(Debug, Serialize)]
pub struct WebhookStatusResponse {
    pub configured: bool,
    pub url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub circuit: CircuitStatus,
}

/// GET /chat/webhook-status
pub async fn webhook_status(State(state): State<AppState>) -> Json<WebhookStatusResponse> {
    let snapshot = state.webhook.breaker_snapshot();
    Json(WebhookStatusResponse {
        configured: state.webhook.is_configured(),
        url: state.config.webhook.url.clone(),
        timeout_secs: state.config.webhook.timeout_secs,
        max_retries: state.config.webhook.max_retries,
        circuit: CircuitStatus {
            open: snapshot.open,
            failure_count: snapshot.failure_count,
            threshold: snapshot.threshold,
            cooldown_secs: snapshot.cooldown_secs,
            cooldown_remaining_secs: snapshot.cooldown_remaining_secs,
        },
    })
}

/// Response body for POST /chat/reset-webhook-circuit.
#[derive(Debug, Serialize)]
pub struct ResetCircuitResponse {
    pub success: bool,
    pub circuit: CircuitStatus,
}

/// POST /chat/reset-webhook-circuit
pub async fn reset_webhook_circuit(State(state): State<AppState>) -> Json<ResetCircuitResponse> {
    state.webhook.reset_breaker();
    let snapshot = state.webhook.breaker_snapshot();
    Json(ResetCircuitResponse {
        success: true,
        circuit: CircuitStatus {
            open: snapshot.open,
            failure_count: snapshot.failure_count,
            threshold: snapshot.threshold,
            cooldown_secs: snapshot.cooldown_secs,
            cooldown_remaining_secs: snapshot.cooldown_remaining_secs,
        },
    })
}

/// Response body for POST /chat/test-webhook.
#[derive(Debug, Serialize)]
pub struct TestWebhookResponse {
    pub success: bool,
    pub outcome: String,
}

/// POST /chat/test-webhook
///
/// Fires a synthetic message event through the dispatcher so operators can
/// verify endpoint reachability without fabricating chat traffic.
pub async fn test_webhook(State(state): State<AppState>) -> Json<TestWebhookResponse> {
    let message = Message::new(
        "+0000000000".to_string(),
        Some("zapline webhook test".to_string()),
        zapline_core::MessageType::User,
        None,
    );
    let outcome = state
        .webhook
        .notify(WebhookEvent::message_created(&message, false))
        .await;
    let (success, outcome) = match outcome {
        DispatchOutcome::Delivered => (true, "delivered".to_string()),
        DispatchOutcome::Skipped(SkipReason::NoEndpoint) => (false, "no_endpoint".to_string()),
        DispatchOutcome::Skipped(SkipReason::CircuitOpen) => (false, "circuit_open".to_string()),
        DispatchOutcome::Failed(reason) => (false, format!("failed: {reason:?}")),
    };
    Json(TestWebhookResponse { success, outcome })
}

/// Response body for POST /chat/upload-attachment.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub full_url: String,
    pub filename: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// POST /chat/upload-attachment
///
/// Multipart upload subject to the same extension and size limits as remote
/// fetches. The stored name is regenerated; only the extension survives.
pub async fn upload_attachment(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| ZaplineError::Validation(format!("malformed multipart body: {e}")))?
        .ok_or_else(|| ZaplineError::Validation("no file field in upload".to_string()))?;

    let original_name = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| ZaplineError::Validation("upload is missing a filename".to_string()))?;
    if !classifier::allowed_file(&original_name) {
        return Err(ApiError(ZaplineError::Validation(format!(
            "file type not allowed: {original_name}"
        ))));
    }
    let content_type = field.content_type().map(str::to_string);

    let data = field
        .bytes()
        .await
        .map_err(|e| ZaplineError::Validation(format!("failed to read upload: {e}")))?;
    let max_bytes = state.config.attachment.max_bytes;
    if data.len() as u64 > max_bytes {
        return Err(ApiError(ZaplineError::Validation(format!(
            "upload exceeds the {max_bytes}-byte limit"
        ))));
    }

    let kind = classifier::classify(&original_name, content_type.as_deref());
    let extension = classifier::extension_of(&original_name)
        .unwrap_or_else(|| classifier::extension_for_kind(kind).to_string());
    let stored_name = format!(
        "{}_{}.{extension}",
        uuid::Uuid::new_v4().simple(),
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    );

    let dir = state.fetcher.upload_dir();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ZaplineError::Internal(format!("failed to create upload dir: {e}")))?;
    tokio::fs::write(dir.join(&stored_name), &data)
        .await
        .map_err(|e| ZaplineError::Internal(format!("failed to store upload: {e}")))?;

    let url = format!("{}{stored_name}", state.config.attachment.local_prefix);
    let full_url = format!(
        "{}{url}",
        state.config.server.public_base_url.trim_end_matches('/')
    );
    Ok(Json(UploadResponse {
        url,
        full_url,
        filename: stored_name,
        size: data.len() as u64,
        kind: kind.as_str().to_string(),
    }))
}

/// GET /chat/uploads/{filename}
///
/// Serves a stored attachment. The filename must be a bare name; anything
/// resembling a path component is rejected before touching the filesystem.
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    if filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "invalid filename".to_string(),
            }),
        )
            .into_response();
    }

    let path = state.fetcher.upload_dir().join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = content_type_for(&filename);
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "file not found".to_string(),
            }),
        )
            .into_response(),
    }
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn content_type_for(filename: &str) -> &'static str {
    match classifier::extension_of(filename).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
