// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `zapline serve` command implementation.
//!
//! Wires the in-memory stores, attachment fetcher, and webhook delivery
//! service into the gateway server and runs it until the process stops.

use std::sync::Arc;

use tracing::info;

use zapline_config::ZaplineConfig;
use zapline_core::ZaplineError;
use zapline_fetch::AttachmentFetcher;
use zapline_gateway::{start_server, AppState, IngestionOrchestrator};
use zapline_storage::{InMemoryMessageStore, InMemoryPhoneRegistry};
use zapline_webhook::WebhookService;

/// Runs the `zapline serve` command.
pub async fn run_serve(config: ZaplineConfig) -> Result<(), ZaplineError> {
    init_tracing(&config.server.log_level);

    info!(
        webhook_configured = config.webhook.url.is_some(),
        upload_dir = %config.attachment.upload_dir,
        "starting zapline serve"
    );

    let store = Arc::new(InMemoryMessageStore::new());
    let registry = Arc::new(InMemoryPhoneRegistry::new());
    let fetcher = Arc::new(AttachmentFetcher::new(
        &config.attachment,
        &config.server.public_base_url,
    )?);
    let webhook = Arc::new(WebhookService::new(&config.webhook)?);

    let orchestrator = Arc::new(IngestionOrchestrator::new(
        store,
        registry,
        fetcher.clone(),
        webhook.clone(),
    ));

    let config = Arc::new(config);
    let state = AppState {
        orchestrator,
        webhook,
        fetcher,
        config: config.clone(),
    };

    start_server(&config, state).await
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("zapline={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
