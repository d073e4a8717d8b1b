//! Scheduled handler modules
//!
//! Every module is an actor: one Tokio task that owns its handler and the only
//! reader of its bus queue. Modules never call each other; they talk through the
//! [`MessageBus`](crate::bus::MessageBus).
//!
//! ## Architecture Overview
//!
//! ```text
//!   ingress ──write──→ [EnclosureAlertHandler]   [ServiceRequestHandler]
//!                               │                   │            │
//!                               └──────write────────┤            │ incidents
//!                                                   ▼            ▼
//!                                         [EgressPublisher]  [LoggingModule]
//!                                                   │
//!                                                 broker
//! ```
//!
//! ## Turn Contract
//!
//! 1. The scheduler loop ticks (or a `TurnNow` command arrives)
//! 2. Unless suspended, the module drains its queue completely
//! 3. A handler error ends the drain; the rest of the queue waits for the next turn
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each module has an mpsc command channel for control messages
//! 2. **Envelopes**: modules write to named bus queues, never to each other directly
//! 3. **Request/Response**: oneshot channels for synchronous queries

pub mod egress;
pub mod enclosure;
pub mod logging;
pub mod messages;
pub mod module;
pub mod scheduler;
pub mod service;

use async_trait::async_trait;

use crate::envelope::Envelope;

/// Per-module message processing
///
/// An `Err` from [`MessageHandler::handle`] is a turn fault: it is logged, the rest
/// of the current drain is abandoned and the module keeps running.
#[async_trait]
pub trait MessageHandler: Send + 'static {
    /// Queue name of this module
    fn name(&self) -> &'static str;

    /// Modules whose queues must exist before this module may run
    fn dependencies(&self) -> Vec<&'static str> {
        Vec::new()
    }

    async fn handle(&mut self, envelope: Envelope) -> anyhow::Result<()>;
}
