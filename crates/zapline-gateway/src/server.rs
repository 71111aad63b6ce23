// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use zapline_config::ZaplineConfig;
use zapline_core::ZaplineError;
use zapline_fetch::AttachmentFetcher;
use zapline_webhook::WebhookService;

use crate::handlers;
use crate::ingest::IngestionOrchestrator;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Ingestion pipeline for both message directions.
    pub orchestrator: Arc<IngestionOrchestrator>,
    /// Webhook delivery facade, for status and operator endpoints.
    pub webhook: Arc<WebhookService>,
    /// Attachment fetcher, for the upload directory.
    pub fetcher: Arc<AttachmentFetcher>,
    /// Full resolved configuration.
    pub config: Arc<ZaplineConfig>,
}

/// Builds the application router.
pub fn build_router(state: AppState) -> Router {
    // axum's default body limit (2 MiB) is far below the attachment ceiling;
    // allow the full ceiling plus multipart framing overhead.
    let body_limit =
        DefaultBodyLimit::max(state.config.attachment.max_bytes as usize + 64 * 1024);

    let chat_routes = Router::new()
        .route("/chat/receive-message", post(handlers::receive_message))
        .route("/chat/send-message", post(handlers::send_message))
        .route("/chat/toggle-ai/{phone_id}", post(handlers::toggle_ai))
        .route("/chat/webhook-status", get(handlers::webhook_status))
        .route(
            "/chat/reset-webhook-circuit",
            post(handlers::reset_webhook_circuit),
        )
        .route("/chat/test-webhook", post(handlers::test_webhook))
        .route("/chat/upload-attachment", post(handlers::upload_attachment))
        .route("/chat/uploads/{filename}", get(handlers::serve_upload))
        .layer(body_limit)
        .with_state(state);

    Router::new()
        .route("/health", get(handlers::health))
        .merge(chat_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Binds the configured address and serves until the process stops.
pub async fn start_server(config: &ZaplineConfig, state: AppState) -> Result<(), ZaplineError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ZaplineError::Internal(format!("failed to bind {addr}: {e}")))?;

    tracing::info!("zapline listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| ZaplineError::Internal(format!("server error: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use zapline_storage::{InMemoryMessageStore, InMemoryPhoneRegistry};

    fn state_for(config: ZaplineConfig) -> AppState {
        let fetcher = Arc::new(
            AttachmentFetcher::new(&config.attachment, &config.server.public_base_url).unwrap(),
        );
        let webhook = Arc::new(WebhookService::new(&config.webhook).unwrap());
        let orchestrator = Arc::new(IngestionOrchestrator::new(
            Arc::new(InMemoryMessageStore::new()),
            Arc::new(InMemoryPhoneRegistry::new()),
            fetcher.clone(),
            webhook.clone(),
        ));
        AppState {
            orchestrator,
            webhook,
            fetcher,
            config: Arc::new(config),
        }
    }

    fn multipart_upload(filename: &str, payload: &[u8]) -> Request<Body> {
        let boundary = "zapline-upload-test";
        let mut body = Vec::with_capacity(payload.len() + 256);
        body.extend_from_slice(
            format!(
                "--{boundary}\r\ncontent-disposition: form-data; name=\"file\"; \
                 filename=\"{filename}\"\r\ncontent-type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/chat/upload-attachment")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn router_builds_with_default_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = ZaplineConfig::default();
        config.attachment.upload_dir = dir.path().display().to_string();
        let _router = build_router(state_for(config));
    }

    #[tokio::test]
    async fn upload_within_ceiling_is_accepted() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = ZaplineConfig::default();
        config.attachment.upload_dir = dir.path().display().to_string();
        let router = build_router(state_for(config));

        // Well past axum's 2 MiB default body limit, well under the ceiling.
        let payload = vec![0u8; 3 * 1024 * 1024];
        let response = router
            .oneshot(multipart_upload("large.pdf", &payload))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let stored: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn upload_over_ceiling_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = ZaplineConfig::default();
        config.attachment.upload_dir = dir.path().display().to_string();
        config.attachment.max_bytes = 1024;
        let router = build_router(state_for(config));

        let payload = vec![0u8; 4 * 1024];
        let response = router
            .oneshot(multipart_upload("too-big.pdf", &payload))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let stored: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(stored.is_empty());
    }
}
