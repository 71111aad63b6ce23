// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Circuit breaker guarding the webhook endpoint.
//!
//! A two-state machine (`Closed` / `Open`) with a timed auto-transition:
//! after `threshold` consecutive failures the breaker opens for `cooldown`,
//! during which new attempts are short-circuited. The `Open -> Closed`
//! transition happens lazily on query. One success closes the breaker
//! immediately without waiting for the cooldown to elapse.
//!
//! State is shared between the request-path dispatcher and the background
//! retry workers; all mutation sits behind a single mutex.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Point-in-time view of the breaker for the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    /// Whether attempts are currently short-circuited.
    pub open: bool,
    /// Consecutive failures recorded since the last success/reset.
    pub failure_count: u32,
    /// Seconds until the breaker closes again, when open.
    pub cooldown_remaining_secs: Option<u64>,
    /// Configured failure threshold.
    pub threshold: u32,
    /// Configured cooldown duration in seconds.
    pub cooldown_secs: u64,
}

#[derive(Debug)]
struct BreakerState {
    failures: u32,
    open_until: Option<Instant>,
}

/// Process-wide circuit breaker state.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerState>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    /// Creates a closed breaker with the given threshold and cooldown.
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerState {
                failures: 0,
                open_until: None,
            }),
            threshold,
            cooldown,
        }
    }

    /// Records a failed attempt; opens the breaker at the threshold.
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.failures += 1;
        if state.failures >= self.threshold {
            state.open_until = Some(Instant::now() + self.cooldown);
        }
    }

    /// Records a successful attempt: resets the count and closes the breaker
    /// immediately, even mid-cooldown.
    pub fn record_success(&self) {
        let mut state = self.lock();
        state.failures = 0;
        state.open_until = None;
    }

    /// Whether attempts are currently short-circuited.
    ///
    /// An elapsed cooldown transitions the breaker back to closed (and zeroes
    /// the failure count) as a side effect of this query.
    pub fn is_open(&self) -> bool {
        let mut state = self.lock();
        match state.open_until {
            Some(deadline) if Instant::now() < deadline => true,
            Some(_) => {
                state.failures = 0;
                state.open_until = None;
                false
            }
            None => false,
        }
    }

    /// Operator action: unconditionally close with zero failures.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.failures = 0;
        state.open_until = None;
    }

    /// Snapshot for the status endpoint. Does not perform the lazy close, so
    /// operators can observe an elapsed-but-unqueried cooldown.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.lock();
        let now = Instant::now();
        let remaining = state
            .open_until
            .filter(|deadline| *deadline > now)
            .map(|deadline| (deadline - now).as_secs());
        BreakerSnapshot {
            open: remaining.is_some(),
            failure_count: state.failures,
            cooldown_remaining_secs: remaining,
            threshold: self.threshold,
            cooldown_secs: self.cooldown.as_secs(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        // Poisoning only matters if a panic happened mid-update; the state is
        // two plain fields, so recover rather than propagate.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
