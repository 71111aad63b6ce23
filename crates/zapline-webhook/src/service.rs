// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use tracing::{debug, warn};

use zapline_config::WebhookConfig;
use zapline_core::ZaplineError;

use crate::breaker::BreakerSnapshot;
use crate::dispatcher::{DispatchOutcome, SkipReason, WebhookDispatcher};
use crate::payload::WebhookEvent;
use crate::retry::RetryScheduler;

/// Immediate-plus-retry delivery facade.
///
/// `notify` makes one inline attempt and, when that attempt fails in a
/// retryable way, hands the event to the background scheduler. Callers get
/// the immediate outcome back; whatever happens afterwards is the
/// scheduler's business.
#[derive(Debug)]
pub struct WebhookService {
    dispatcher: Arc<WebhookDispatcher>,
    scheduler: RetryScheduler,
    configured: bool,
}

impl WebhookService {
    pub fn new(config: &WebhookConfig) -> Result<Self, ZaplineError> {
        let dispatcher = Arc::new(WebhookDispatcher::new(config)?);
        let scheduler = RetryScheduler::start(dispatcher.clone(), config);
        Ok(Self {
            dispatcher,
            scheduler,
            configured: config.url.is_some(),
        })
    }

    /// Whether an endpoint URL is configured at all.
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Current breaker state, for the status endpoint.
    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.dispatcher.breaker().snapshot()
    }

    /// Clears the breaker back to closed with zero failures.
    pub fn reset_breaker(&self) {
        self.dispatcher.breaker().reset();
    }

    /// One immediate attempt, scheduling background retries on retryable
    /// failure. Returns the immediate attempt's outcome.
    pub async fn notify(&self, event: WebhookEvent) -> DispatchOutcome {
        let outcome = self.dispatcher.send(&event).await;
        match &outcome {
            DispatchOutcome::Delivered => {
                debug!(event_type = %event.event_type, "webhook delivered");
            }
            DispatchOutcome::Skipped(SkipReason::NoEndpoint) => {}
            DispatchOutcome::Skipped(SkipReason::CircuitOpen) => {
                debug!(event_type = %event.event_type, "webhook skipped, circuit open");
            }
            DispatchOutcome::Failed(reason) if reason.is_retryable() => {
                // The failure may just have opened the breaker; queuing a
                // task that will be discarded on its first attempt is noise.
                if self.dispatcher.breaker().is_open() {
                    warn!(event_type = %event.event_type, ?reason, "webhook failed, circuit now open");
                } else if !self.scheduler.enqueue(event.clone()) {
                    warn!(event_type = %event.event_type, ?reason, "webhook failed, retry not scheduled");
                }
            }
            DispatchOutcome::Failed(reason) => {
                warn!(event_type = %event.event_type, ?reason, "webhook payload rejected");
            }
        }
        outcome
    }

    /// Drains the retry queue. Used on shutdown.
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
    }
}
