// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded background retry for failed webhook deliveries.
//!
//! A fixed worker pool consumes retry tasks from a bounded queue, decoupled
//! from any request's lifetime. Each attempt sleeps the fixed inter-attempt
//! delay, then re-invokes the dispatch primitive, which consults and updates
//! the circuit breaker exactly as immediate attempts do. Tasks are dropped
//! after success, after exhausting their attempt budget, or when the breaker
//! opens underneath them. Nothing survives a process restart; at-least-once
//! holds only within one process lifetime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use zapline_config::WebhookConfig;

use crate::dispatcher::{DispatchOutcome, SkipReason, WebhookDispatcher};
use crate::payload::WebhookEvent;

/// A pending background delivery attempt.
#[derive(Debug)]
pub struct RetryTask {
    /// The payload to redeliver.
    pub event: WebhookEvent,
    /// Attempts made so far (the failed immediate attempt is not counted).
    pub attempt: u32,
    /// Attempt budget for this task.
    pub max_attempts: u32,
}

/// Owns the retry queue and its worker pool.
#[derive(Debug)]
pub struct RetryScheduler {
    tx: mpsc::Sender<RetryTask>,
    workers: Vec<JoinHandle<()>>,
    max_attempts: u32,
}

impl RetryScheduler {
    /// Spawns the worker pool and returns the scheduler handle.
    pub fn start(dispatcher: Arc<WebhookDispatcher>, config: &WebhookConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.retry_queue_size.max(1));
        let shared_rx = Arc::new(Mutex::new(rx));
        let delay = Duration::from_secs(config.retry_delay_secs);

        let workers = (0..config.retry_workers.max(1))
            .map(|_| {
                tokio::spawn(retry_worker(
                    shared_rx.clone(),
                    dispatcher.clone(),
                    delay,
                ))
            })
            .collect();

        Self {
            tx,
            workers,
            max_attempts: config.max_retries,
        }
    }

    /// Enqueues an event for background redelivery.
    ///
    /// Returns false when the retry budget is zero or the queue is full;
    /// bounded resource usage beats completeness here.
    pub fn enqueue(&self, event: WebhookEvent) -> bool {
        if self.max_attempts == 0 {
            return false;
        }
        let task = RetryTask {
            event,
            attempt: 0,
            max_attempts: self.max_attempts,
        };
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(task)) => {
                warn!(event_type = %task.event.event_type, "retry queue full, dropping task");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Stops accepting tasks and waits for in-flight retries to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.await;
        }
    }
}

/// Worker loop: pull a task from the shared queue, drive it to a terminal
/// state, repeat. Sleeping happens here, never on a request path.
async fn retry_worker(
    rx: Arc<Mutex<mpsc::Receiver<RetryTask>>>,
    dispatcher: Arc<WebhookDispatcher>,
    delay: Duration,
) {
    loop {
        let task = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };
        let Some(task) = task else { break };
        run_task(task, &dispatcher, delay).await;
    }
}

/// Drives one task to a terminal state.
async fn run_task(mut task: RetryTask, dispatcher: &WebhookDispatcher, delay: Duration) {
    loop {
        tokio::time::sleep(delay).await;
        task.attempt += 1;

        match dispatcher.send(&task.event).await {
            DispatchOutcome::Delivered => {
                info!(
                    event_type = %task.event.event_type,
                    attempt = task.attempt,
                    "webhook retry succeeded"
                );
                return;
            }
            DispatchOutcome::Skipped(SkipReason::CircuitOpen) => {
                // The breaker short-circuits this task's remaining budget;
                // the next organic send re-probes the endpoint.
                warn!(
                    event_type = %task.event.event_type,
                    attempt = task.attempt,
                    "circuit open, abandoning retry task"
                );
                return;
            }
            DispatchOutcome::Skipped(SkipReason::NoEndpoint) => return,
            DispatchOutcome::Failed(reason) if !reason.is_retryable() => {
                // Should not reach the queue; terminal regardless.
                error!(event_type = %task.event.event_type, ?reason, "unretryable failure in retry task");
                return;
            }
            DispatchOutcome::Failed(reason) => {
                if task.attempt >= task.max_attempts {
                    error!(
                        event_type = %task.event.event_type,
                        attempts = task.attempt,
                        ?reason,
                        "webhook retries exhausted, dropping event"
                    );
                    return;
                }
                warn!(
                    event_type = %task.event.event_type,
                    attempt = task.attempt,
                    max = task.max_attempts,
                    ?reason,
                    "webhook retry failed, will try again"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(url: String) -> WebhookConfig {
        WebhookConfig {
            url: Some(url),
            timeout_secs: 2,
            max_retries: 2,
            retry_delay_secs: 0,
            retry_workers: 1,
            retry_queue_size: 8,
            ..WebhookConfig::default()
        }
    }

    #[tokio::test]
    async fn exhausted_task_stops_calling_the_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            // Exactly max_retries attempts, then the task is discarded.
            .expect(2)
            .mount(&server)
            .await;

        let config = config_for(server.uri());
        let dispatcher = Arc::new(WebhookDispatcher::new(&config).unwrap());
        let scheduler = RetryScheduler::start(dispatcher, &config);

        assert!(scheduler.enqueue(WebhookEvent::ai_toggled("+5511999999999", false, true)));
        scheduler.shutdown().await;
        server.verify().await;
    }

    #[tokio::test]
    async fn successful_retry_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(server.uri());
        let dispatcher = Arc::new(WebhookDispatcher::new(&config).unwrap());
        let scheduler = RetryScheduler::start(dispatcher.clone(), &config);

        assert!(scheduler.enqueue(WebhookEvent::ai_toggled("+5511999999999", false, true)));
        scheduler.shutdown().await;
        server.verify().await;
        assert_eq!(dispatcher.breaker().snapshot().failure_count, 0);
    }

    #[tokio::test]
    async fn open_breaker_abandons_queued_tasks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = config_for(server.uri());
        config.breaker_threshold = 1;
        let dispatcher = Arc::new(WebhookDispatcher::new(&config).unwrap());
        dispatcher.breaker().record_failure();

        let scheduler = RetryScheduler::start(dispatcher, &config);
        assert!(scheduler.enqueue(WebhookEvent::ai_toggled("+5511999999999", false, true)));
        scheduler.shutdown().await;
        server.verify().await;
    }

    #[tokio::test]
    async fn zero_retry_budget_rejects_enqueue() {
        let mut config = config_for("http://127.0.0.1:1".to_string());
        config.max_retries = 0;
        let dispatcher = Arc::new(WebhookDispatcher::new(&config).unwrap());
        let scheduler = RetryScheduler::start(dispatcher, &config);
        assert!(!scheduler.enqueue(WebhookEvent::ai_toggled("+5511999999999", false, true)));
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn retry_burst_trips_the_breaker_for_later_tasks() {
        let server = MockServer::start().await;
        // First task: 2 failing attempts open the breaker (threshold 2).
        // Second task: skipped without a call.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let mut config = config_for(server.uri());
        config.breaker_threshold = 2;
        let dispatcher = Arc::new(WebhookDispatcher::new(&config).unwrap());
        let scheduler = RetryScheduler::start(dispatcher.clone(), &config);

        assert!(scheduler.enqueue(WebhookEvent::ai_toggled("+5511999999999", false, true)));
        assert!(scheduler.enqueue(WebhookEvent::ai_toggled("+5511988887777", false, true)));
        scheduler.shutdown().await;
        server.verify().await;
        assert!(dispatcher.breaker().is_open());
    }
}
