// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound webhook delivery: payload construction, a failure-counting
//! circuit breaker, single-attempt dispatch, and a bounded background
//! retry pool behind one [`WebhookService`] facade.

pub mod breaker;
pub mod dispatcher;
pub mod payload;
pub mod retry;
pub mod service;

pub use breaker::{BreakerSnapshot, CircuitBreaker};
pub use dispatcher::{DispatchError, DispatchOutcome, SkipReason, WebhookDispatcher};
pub use payload::WebhookEvent;
pub use retry::{RetryScheduler, RetryTask};
pub use service::WebhookService;
