// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle event bus.
//!
//! One bounded producer channel feeds a fan-out task that forwards to
//! subscriber channels. Lifecycle events are advisory, not
//! transactional: the producer never blocks. A full bus drops the
//! event with a log line, and a full subscriber is skipped.

use flo_core::ServiceEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Producer-side channel capacity.
pub const EVENT_CAPACITY: usize = 256;

/// Per-subscriber channel capacity.
pub const SUBSCRIBER_CAPACITY: usize = 32;

/// Handle identifying one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type SubscriberMap = Arc<Mutex<HashMap<SubscriberId, mpsc::Sender<ServiceEvent>>>>;

/// The orchestrator-owned event bus.
pub struct EventBus {
    tx: mpsc::Sender<ServiceEvent>,
    subscribers: SubscriberMap,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create the bus and spawn its fan-out task. Must be called from
    /// within a tokio runtime.
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::channel::<ServiceEvent>(EVENT_CAPACITY);
        let subscribers: SubscriberMap = Arc::new(Mutex::new(HashMap::new()));

        let fanout = Arc::clone(&subscribers);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let mut closed = Vec::new();
                {
                    let subs = fanout.lock();
                    for (id, sub) in subs.iter() {
                        match sub.try_send(event.clone()) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                tracing::debug!(subscriber = id.0, "subscriber full, skipping event");
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
                        }
                    }
                }
                if !closed.is_empty() {
                    let mut subs = fanout.lock();
                    for id in closed {
                        subs.remove(&id);
                    }
                }
            }
        });

        Self {
            tx,
            subscribers,
            next_id: AtomicU64::new(0),
        }
    }

    /// A cloneable producer handle for managed services.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            tx: self.tx.clone(),
        }
    }

    /// Register a subscriber channel; events flow until
    /// [`EventBus::unsubscribe`] or the receiver is dropped.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<ServiceEvent>) {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().insert(id, tx);
        (id, rx)
    }

    /// Remove a subscriber. Dropping its sender closes the channel;
    /// the map entry guarantees this happens exactly once.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.lock().remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking producer handle held by each managed service.
#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<ServiceEvent>,
}

impl EventEmitter {
    pub fn emit(&self, event: ServiceEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(%event, "event bus full, dropping lifecycle event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// An emitter not connected to any bus (for tests and tools that
    /// do not care about events).
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
