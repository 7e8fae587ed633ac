// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded FIFO of recent request errors.

use crate::error::ErrorKind;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default ring capacity.
pub const DEFAULT_ERROR_CAPACITY: usize = 100;

/// One recorded request failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp_ms: u64,
    pub service: String,
    pub operation: String,
    pub kind: ErrorKind,
    pub message: String,
    pub request_id: String,
}

/// Bounded error history; oldest entries are evicted on overflow.
#[derive(Debug)]
pub struct ErrorRing {
    entries: Mutex<VecDeque<ErrorEntry>>,
    capacity: usize,
}

impl ErrorRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, entry: ErrorEntry) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// All retained entries, oldest first.
    pub fn snapshot(&self) -> Vec<ErrorEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// The most recent `n` entries, newest last.
    pub fn last(&self, n: usize) -> Vec<ErrorEntry> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for ErrorRing {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_CAPACITY)
    }
}

#[cfg(test)]
#[path = "error_log_tests.rs"]
mod tests;
