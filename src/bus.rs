//! Internal message bus
//!
//! Named, per-destination FIFO queues backed by unbounded Tokio channels.
//!
//! - [`MessageBus::register`] creates a queue and hands out its only [`QueueReader`].
//! - [`MessageBus::write`] appends to a destination queue and never fails.
//! - [`QueueReader::read`] pops the oldest envelope without blocking.
//!
//! Ordering is guaranteed per destination only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{trace, warn};

use crate::envelope::Envelope;
use crate::error::{RouterError, RouterResult};

/// Queue of the broker-facing publisher
pub const EGRESS_PUBLISHER: &str = "EgressPublisher";

/// Queue of the incident logging module
pub const LOGGING_MODULE: &str = "LoggingModule";

/// Queue of the enclosure alert handler
pub const ENCLOSURE_ALERT_HANDLER: &str = "EnclosureAlertHandler";

/// Queue of the service request handler
pub const SERVICE_REQUEST_HANDLER: &str = "ServiceRequestHandler";

#[derive(Clone)]
struct QueueSlot {
    tx: UnboundedSender<Envelope>,
    pending: Arc<AtomicUsize>,
}

/// Directory of named queues
///
/// Cloning the bus is cheap; all clones share the same directory.
#[derive(Clone, Default)]
pub struct MessageBus {
    queues: Arc<RwLock<HashMap<String, QueueSlot>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the queue `name` and return its reader
    ///
    /// Each queue has exactly one reader, so registering a live name twice is an error.
    pub fn register(&self, name: &str) -> RouterResult<QueueReader> {
        let mut queues = self
            .queues
            .write()
            .map_err(|_| RouterError::InvalidConfig("bus directory poisoned".to_string()))?;

        if queues.get(name).is_some_and(|slot| !slot.tx.is_closed()) {
            return Err(RouterError::DuplicateQueue(name.to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        queues.insert(
            name.to_string(),
            QueueSlot {
                tx,
                pending: pending.clone(),
            },
        );
        trace!("registered queue {name}");

        Ok(QueueReader {
            name: name.to_string(),
            rx,
            pending,
        })
    }

    /// Check that `name` is a known, live destination
    pub fn resolve(&self, name: &str) -> RouterResult<()> {
        self.slot(name)
            .filter(|slot| !slot.tx.is_closed())
            .map(|_| ())
            .ok_or_else(|| RouterError::UnknownDestination(name.to_string()))
    }

    /// Append `envelope` to the queue of `destination`
    ///
    /// Unknown or shut-down destinations drop the envelope.
    pub fn write(&self, destination: &str, envelope: Envelope) {
        let Some(slot) = self.slot(destination) else {
            warn!("no queue named {destination}, envelope discarded");
            return;
        };

        slot.pending.fetch_add(1, Ordering::SeqCst);
        if slot.tx.send(envelope).is_err() {
            release(&slot.pending);
            warn!("queue {destination} is closed, envelope discarded");
        }
    }

    /// Non-consuming emptiness check; unknown queues count as empty
    pub fn is_empty(&self, name: &str) -> bool {
        self.slot(name)
            .is_none_or(|slot| slot.pending.load(Ordering::SeqCst) == 0)
    }

    /// Names of all registered queues
    pub fn destinations(&self) -> Vec<String> {
        self.queues
            .read()
            .map(|queues| queues.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn slot(&self, name: &str) -> Option<QueueSlot> {
        self.queues
            .read()
            .ok()
            .and_then(|queues| queues.get(name).cloned())
    }
}

/// The single consuming end of a named queue
#[derive(Debug)]
pub struct QueueReader {
    name: String,
    rx: UnboundedReceiver<Envelope>,
    pending: Arc<AtomicUsize>,
}

impl QueueReader {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pop the oldest envelope, or `None` if the queue is empty
    pub fn read(&mut self) -> Option<Envelope> {
        let envelope = self.rx.try_recv().ok()?;
        release(&self.pending);
        Some(envelope)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Close the queue and return how many queued envelopes were discarded
    pub fn close(mut self) -> usize {
        self.rx.close();
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        self.pending.store(0, Ordering::SeqCst);
        discarded
    }
}

/// Decrement a pending counter, never below zero
///
/// `close` may reset the counter between a writer's increment and its failed send.
fn release(pending: &AtomicUsize) {
    let _ = pending.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
        Some(n.saturating_sub(1))
    });
}
