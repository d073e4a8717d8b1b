//! Actuator capabilities
//!
//! A capability (for example `"Service"`) is an abstract actuator role. The
//! [`CapabilityRegistry`] maps each capability name to a factory; construction is
//! deferred until the first request that needs it and is guarded by the
//! [`LifecycleStore`](crate::lifecycle::LifecycleStore).

pub mod systemd;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;

use crate::envelope::ActuatorRequest;

/// Capability name of the service actuator
pub const SERVICE_CAPABILITY: &str = "Service";

/// Result of an actuator request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorOutcome {
    pub resource_name: String,
    pub state: String,
    pub substate: Option<String>,
}

impl ActuatorOutcome {
    /// `state`, or `state:substate` when a substate is present
    pub fn response(&self) -> String {
        match self.substate.as_deref() {
            Some(substate) if !substate.is_empty() => format!("{}:{substate}", self.state),
            _ => self.state.clone(),
        }
    }
}

#[async_trait]
pub trait Actuator: Send + Sync {
    fn name(&self) -> &str;

    /// Execute `request` and report the resulting resource state
    async fn perform_request(&self, request: &ActuatorRequest) -> anyhow::Result<ActuatorOutcome>;
}

pub type ActuatorFactory = Arc<dyn Fn() -> anyhow::Result<Arc<dyn Actuator>> + Send + Sync>;

/// Capability name → factory
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    factories: HashMap<String, ActuatorFactory>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn Actuator>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Construct a fresh instance of `name`
    pub fn construct(&self, name: &str) -> anyhow::Result<Arc<dyn Actuator>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| anyhow!("no factory registered for capability {name}"))?;
        factory()
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
