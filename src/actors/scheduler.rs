//! Scheduler - wires modules to the bus and starts them by priority
//!
//! Modules are added first so that every queue exists before any dependency is
//! checked. [`Scheduler::start`] then verifies the declared dependencies and spawns
//! the actors in ascending priority order (lower value runs first).

use futures::future::join_all;
use tracing::{debug, info};

use crate::bus::{MessageBus, QueueReader};
use crate::config::ResolvedModuleConfig;
use crate::error::{RouterError, RouterResult};

use super::MessageHandler;
use super::messages::TurnReport;
use super::module::ModuleHandle;

type Starter = Box<dyn FnOnce() -> ModuleHandle + Send>;

struct PendingModule {
    name: &'static str,
    priority: u8,
    dependencies: Vec<&'static str>,
    start: Starter,
}

/// Collects modules before startup
pub struct Scheduler {
    bus: MessageBus,
    pending: Vec<PendingModule>,
}

impl Scheduler {
    pub fn new(bus: MessageBus) -> Self {
        Self {
            bus,
            pending: Vec::new(),
        }
    }

    /// Register `handler`'s queue and record its priority and dependencies
    ///
    /// Nothing runs until [`Scheduler::start`].
    pub fn add<H: MessageHandler>(
        mut self,
        handler: H,
        config: ResolvedModuleConfig,
    ) -> RouterResult<Self> {
        let name = handler.name();
        if self.pending.iter().any(|m| m.name == name) {
            return Err(RouterError::DuplicateModule(name.to_string()));
        }

        let reader: QueueReader = self.bus.register(name)?;
        let priority = config.priority;
        let dependencies = handler.dependencies();

        self.pending.push(PendingModule {
            name,
            priority,
            dependencies,
            start: Box::new(move || ModuleHandle::start(handler, reader, config)),
        });

        Ok(self)
    }

    /// Verify dependencies and spawn every module
    pub fn start(self) -> RouterResult<SchedulerHandle> {
        for module in &self.pending {
            for dependency in &module.dependencies {
                self.bus
                    .resolve(dependency)
                    .map_err(|_| RouterError::UnknownDependency {
                        module: module.name.to_string(),
                        dependency: dependency.to_string(),
                    })?;
            }
        }

        let mut pending = self.pending;
        pending.sort_by_key(|m| m.priority);

        let modules = pending
            .into_iter()
            .map(|module| {
                debug!("starting {} (priority {})", module.name, module.priority);
                (module.start)()
            })
            .collect::<Vec<_>>();

        info!("started {} module(s)", modules.len());
        Ok(SchedulerHandle { modules })
    }
}

/// Handles of all running modules, in priority order
#[derive(Clone)]
pub struct SchedulerHandle {
    modules: Vec<ModuleHandle>,
}

impl SchedulerHandle {
    pub fn module(&self, name: &str) -> Option<&ModuleHandle> {
        self.modules.iter().find(|m| m.name() == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.modules.iter().map(ModuleHandle::name).collect()
    }

    /// Run one turn of every module in priority order
    pub async fn turn_all(&self) -> Vec<(&'static str, TurnReport)> {
        let mut reports = Vec::with_capacity(self.modules.len());
        for module in &self.modules {
            let report = module.turn_now().await.unwrap_or_default();
            reports.push((module.name(), report));
        }
        reports
    }

    /// Shut every module down and wait until all have released their queues
    pub async fn shutdown(&self) {
        join_all(self.modules.iter().map(|m| m.shutdown())).await;
        join_all(self.modules.iter().map(|m| m.stopped())).await;
        info!("all modules stopped");
    }
}
