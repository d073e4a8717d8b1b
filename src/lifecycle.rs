//! Capability lifecycle table
//!
//! ## State Machine
//!
//! ```text
//! NotLoaded                          (never listed, never constructed)
//! Imported ──begin_initializing──→ Initializing ──complete──→ Initialized
//!     ↑                                 │
//!     └──────────── abort ──────────────┘   (construction failed)
//! ```
//!
//! The store is injected into every handler that needs it. The constructed
//! instance lives in the capability's slot next to its state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::actuators::Actuator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityState {
    NotLoaded,
    Imported,
    Initializing,
    Initialized,
}

impl fmt::Display for CapabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapabilityState::NotLoaded => "NOT_LOADED",
            CapabilityState::Imported => "IMPORTED",
            CapabilityState::Initializing => "INITIALIZING",
            CapabilityState::Initialized => "INITIALIZED",
        };
        f.write_str(name)
    }
}

struct CapabilitySlot {
    state: CapabilityState,
    instance: Option<Arc<dyn Actuator>>,
}

/// Shared table of capability states
#[derive(Clone, Default)]
pub struct LifecycleStore {
    slots: Arc<RwLock<HashMap<String, CapabilitySlot>>>,
}

impl LifecycleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with every listed capability marked `Imported`
    pub fn with_imported<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots = names
            .into_iter()
            .map(|name| {
                (
                    name.into(),
                    CapabilitySlot {
                        state: CapabilityState::Imported,
                        instance: None,
                    },
                )
            })
            .collect();

        Self {
            slots: Arc::new(RwLock::new(slots)),
        }
    }

    /// Current state; unknown capabilities are `NotLoaded`
    pub async fn state(&self, name: &str) -> CapabilityState {
        self.slots
            .read()
            .await
            .get(name)
            .map_or(CapabilityState::NotLoaded, |slot| slot.state)
    }

    pub async fn is_state(&self, name: &str, state: CapabilityState) -> bool {
        self.state(name).await == state
    }

    /// Unconditional overwrite
    pub async fn set_state(&self, name: &str, state: CapabilityState) {
        trace!("capability {name} -> {state}");
        let mut slots = self.slots.write().await;
        slots
            .entry(name.to_string())
            .and_modify(|slot| slot.state = state)
            .or_insert(CapabilitySlot {
                state,
                instance: None,
            });
    }

    /// Move `Imported` to `Initializing` in one step
    ///
    /// Returns `false` if the capability was in any other state, in which case the
    /// caller does not own construction.
    pub async fn begin_initializing(&self, name: &str) -> bool {
        let mut slots = self.slots.write().await;
        match slots.get_mut(name) {
            Some(slot) if slot.state == CapabilityState::Imported => {
                slot.state = CapabilityState::Initializing;
                debug!("capability {name} initializing");
                true
            }
            _ => false,
        }
    }

    /// Store the constructed instance and mark the capability `Initialized`
    pub async fn complete(&self, name: &str, instance: Arc<dyn Actuator>) {
        let mut slots = self.slots.write().await;
        let slot = slots.entry(name.to_string()).or_insert(CapabilitySlot {
            state: CapabilityState::Initialized,
            instance: None,
        });
        slot.state = CapabilityState::Initialized;
        slot.instance = Some(instance);
        debug!("capability {name} initialized");
    }

    /// Return a capability whose construction failed to `Imported`
    pub async fn abort(&self, name: &str) {
        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.get_mut(name) {
            slot.state = CapabilityState::Imported;
            slot.instance = None;
        }
    }

    /// Live instance of an initialized capability
    pub async fn instance(&self, name: &str) -> Option<Arc<dyn Actuator>> {
        self.slots
            .read()
            .await
            .get(name)
            .and_then(|slot| slot.instance.clone())
    }
}
