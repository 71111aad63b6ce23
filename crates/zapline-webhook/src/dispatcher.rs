// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Immediate webhook delivery.
//!
//! The dispatcher performs exactly one synchronous send per call, bounded by
//! the short dispatch timeout, and reports the outcome without throwing
//! control back as a user-facing error. Skips (breaker open, no endpoint)
//! are distinct outcomes from true network failures so operators can tell
//! "endpoint unreachable" apart from "breaker protecting it".

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use zapline_config::WebhookConfig;
use zapline_core::error::ZaplineError;

use crate::breaker::CircuitBreaker;
use crate::payload::WebhookEvent;

/// Why a send was skipped without a network attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The circuit breaker is open.
    CircuitOpen,
    /// No webhook URL is configured.
    NoEndpoint,
}

/// Why a network attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The payload failed local validation/serialization. Never retried.
    PayloadInvalid(String),
    /// The dispatch timeout elapsed.
    Timeout,
    /// Connection-level failure.
    Transport,
    /// Non-success HTTP response.
    Http(u16),
}

impl DispatchError {
    /// Whether a background retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DispatchError::PayloadInvalid(_))
    }
}

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Skipped(SkipReason),
    Failed(DispatchError),
}

/// Sends webhook events to the configured endpoint.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: Option<String>,
    timeout: Duration,
    breaker: Arc<CircuitBreaker>,
}

impl WebhookDispatcher {
    /// Builds a dispatcher (and its breaker) from the webhook config section.
    pub fn new(config: &WebhookConfig) -> Result<Self, ZaplineError> {
        let breaker = Arc::new(CircuitBreaker::new(
            config.breaker_threshold,
            Duration::from_secs(config.breaker_cooldown_secs),
        ));
        Self::with_breaker(config, breaker)
    }

    /// Builds a dispatcher sharing an existing breaker.
    pub fn with_breaker(
        config: &WebhookConfig,
        breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, ZaplineError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("zapline-webhook/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ZaplineError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            breaker,
        })
    }

    /// The breaker guarding this dispatcher, shared with the retry workers.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Attempts exactly one delivery of `event`.
    ///
    /// Consults the breaker first; skipped attempts make no network call and
    /// record neither success nor failure. Validation happens before the
    /// network call so a malformed payload is reported as `PayloadInvalid`
    /// rather than mistaken for an endpoint problem.
    pub async fn send(&self, event: &WebhookEvent) -> DispatchOutcome {
        let Some(url) = self.url.as_deref() else {
            debug!(event_type = %event.event_type, "no webhook URL configured, skipping");
            return DispatchOutcome::Skipped(SkipReason::NoEndpoint);
        };

        if self.breaker.is_open() {
            warn!(event_type = %event.event_type, "circuit breaker open, skipping webhook");
            return DispatchOutcome::Skipped(SkipReason::CircuitOpen);
        }

        let body = match event.to_body() {
            Ok(body) => body,
            Err(reason) => {
                error!(event_type = %event.event_type, %reason, "webhook payload invalid, not sending");
                return DispatchOutcome::Failed(DispatchError::PayloadInvalid(reason));
            }
        };

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                self.breaker.record_success();
                info!(
                    event_type = %event.event_type,
                    phone = %event.phone_number,
                    status = resp.status().as_u16(),
                    "webhook delivered"
                );
                DispatchOutcome::Delivered
            }
            Ok(resp) => {
                let status = resp.status().as_u16();
                self.breaker.record_failure();
                warn!(event_type = %event.event_type, status, "webhook endpoint returned error");
                DispatchOutcome::Failed(DispatchError::Http(status))
            }
            Err(e) if e.is_timeout() => {
                self.breaker.record_failure();
                warn!(event_type = %event.event_type, timeout = ?self.timeout, "webhook timed out");
                DispatchOutcome::Failed(DispatchError::Timeout)
            }
            Err(e) => {
                self.breaker.record_failure();
                warn!(event_type = %event.event_type, error = %e, "webhook connection failed");
                DispatchOutcome::Failed(DispatchError::Transport)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(url: Option<String>) -> WebhookConfig {
        WebhookConfig {
            url,
            timeout_secs: 2,
            ..WebhookConfig::default()
        }
    }

    fn event() -> WebhookEvent {
        WebhookEvent::ai_toggled("+5511999999999", false, true)
    }

    #[tokio::test]
    async fn delivered_on_2xx_and_breaker_success_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher =
            WebhookDispatcher::new(&config_for(Some(format!("{}/hook", server.uri())))).unwrap();
        dispatcher.breaker().record_failure();

        let outcome = dispatcher.send(&event()).await;
        assert_eq!(outcome, DispatchOutcome::Delivered);
        // Success reset the earlier failure.
        assert_eq!(dispatcher.breaker().snapshot().failure_count, 0);
    }

    #[tokio::test]
    async fn http_error_records_breaker_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher =
            WebhookDispatcher::new(&config_for(Some(server.uri()))).unwrap();
        let outcome = dispatcher.send(&event()).await;
        assert_eq!(outcome, DispatchOutcome::Failed(DispatchError::Http(500)));
        assert_eq!(dispatcher.breaker().snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn unconfigured_endpoint_skips_without_breaker_updates() {
        let dispatcher = WebhookDispatcher::new(&config_for(None)).unwrap();
        let outcome = dispatcher.send(&event()).await;
        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::NoEndpoint));
        assert_eq!(dispatcher.breaker().snapshot().failure_count, 0);
    }

    #[tokio::test]
    async fn open_breaker_skips_without_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = config_for(Some(server.uri()));
        config.breaker_threshold = 1;
        let dispatcher = WebhookDispatcher::new(&config).unwrap();
        dispatcher.breaker().record_failure();

        let outcome = dispatcher.send(&event()).await;
        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::CircuitOpen));
        // A skip is not a new failure.
        assert_eq!(dispatcher.breaker().snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn invalid_payload_is_failed_locally_and_breaker_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dispatcher =
            WebhookDispatcher::new(&config_for(Some(server.uri()))).unwrap();
        let bad = WebhookEvent::ai_toggled("+55", false, true);
        let outcome = dispatcher.send(&bad).await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Failed(DispatchError::PayloadInvalid(_))
        ));
        assert_eq!(dispatcher.breaker().snapshot().failure_count, 0);
    }

    #[tokio::test]
    async fn transport_error_records_failure() {
        // Unroutable port: connection refused.
        let dispatcher = WebhookDispatcher::new(&config_for(Some(
            "http://127.0.0.1:1/hook".to_string(),
        )))
        .unwrap();
        let outcome = dispatcher.send(&event()).await;
        assert_eq!(outcome, DispatchOutcome::Failed(DispatchError::Transport));
        assert_eq!(dispatcher.breaker().snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn payload_body_is_sent_verbatim() {
        let server = MockServer::start().await;
        let event = event();
        let expected = event.to_body().unwrap();
        Mock::given(method("POST"))
            .and(body_json_string(&expected))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher =
            WebhookDispatcher::new(&config_for(Some(server.uri()))).unwrap();
        assert_eq!(dispatcher.send(&event).await, DispatchOutcome::Delivered);
    }
}
