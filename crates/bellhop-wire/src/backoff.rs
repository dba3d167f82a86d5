//! Reconnect backoff: a cyclic step schedule for connect attempts.
//!
//! The schedule walks `[1s, 3s, 10s]`, spending six attempts on each step
//! (the first try plus five retries) before advancing, and wraps back to
//! the first step after the last. It governs connect attempts only, never
//! in-flight calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const STEPS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(3),
    Duration::from_secs(10),
];
const TRIES_PER_STEP: u64 = 6;

/// Deterministic delay sequence for a reconnect loop.
#[derive(Debug, Default)]
pub struct StepBackoff {
    attempt: u64,
}

impl StepBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay to sleep before the next connect attempt.
    pub fn next_delay(&mut self) -> Duration {
        let step = (self.attempt / TRIES_PER_STEP) as usize % STEPS.len();
        self.attempt += 1;
        STEPS[step]
    }

    /// Back to the first step, e.g. after a successful connect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Cancellation handle for a supervised reconnect loop.
#[derive(Clone, Debug, Default)]
pub struct ReconnectHandle {
    cancelled: Arc<AtomicBool>,
}

impl ReconnectHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
