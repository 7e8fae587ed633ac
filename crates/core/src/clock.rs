// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A clock that provides the current time.
///
/// `now()` is a monotonic instant for interval arithmetic (locator TTL,
/// health intervals); `epoch_ms()` is wall-clock time for timestamps
/// that cross the wire.
pub trait Clock: Clone + Send + Sync {
    fn now(&self) -> Instant;
    fn epoch_ms(&self) -> u64;
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        // Pre-epoch system time collapses to 0 rather than panicking.
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => since.as_millis() as u64,
            Err(_) => 0,
        }
    }
}

/// Fake clock for tests: a fixed origin plus a controllable offset.
#[derive(Clone)]
pub struct FakeClock {
    origin: Instant,
    epoch_base_ms: u64,
    offset: Arc<Mutex<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            epoch_base_ms: 1_700_000_000_000,
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        *self.offset.lock() += duration;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }

    fn epoch_ms(&self) -> u64 {
        self.epoch_base_ms + self.offset.lock().as_millis() as u64
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
