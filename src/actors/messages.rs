//! Control messages for scheduled modules

use std::fmt;

use tokio::sync::oneshot;

/// Lifecycle of a scheduled module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Constructed, no turn taken yet
    Initialized,

    /// Draining its queue on every turn
    Running,

    /// Turns are no-ops until resumed
    Suspended,

    /// Terminal; the queue has been released
    ShuttingDown,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleState::Initialized => "initialized",
            ModuleState::Running => "running",
            ModuleState::Suspended => "suspended",
            ModuleState::ShuttingDown => "shutting down",
        };
        f.write_str(name)
    }
}

/// Outcome of a single turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnReport {
    /// Envelopes handed to the handler (including a faulting one)
    pub processed: usize,

    /// Whether a handler fault cut the drain short
    pub faulted: bool,

    /// Whether the turn was skipped because the module is suspended
    pub skipped: bool,
}

/// Commands that can be sent to a module actor
#[derive(Debug)]
pub enum ModuleCommand {
    /// Run a turn immediately, outside the interval timer
    ///
    /// Used for testing and for the daemon's shutdown flush.
    TurnNow {
        respond_to: oneshot::Sender<TurnReport>,
    },

    /// Make subsequent turns no-ops
    Suspend,

    /// Resume draining on the next turn
    Resume,

    /// Query the current lifecycle state
    GetState {
        respond_to: oneshot::Sender<ModuleState>,
    },

    /// Stop the actor and discard anything still queued
    Shutdown,
}
