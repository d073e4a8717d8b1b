//! Router assembly
//!
//! Builds the bus, the lifecycle store and the four modules from a [`Config`],
//! then starts them through the [`Scheduler`]. Request handlers get a lower
//! priority value than their consumers, so one pass of
//! [`SchedulerHandle::turn_all`] carries an inbound request all the way out.

use anyhow::Result;
use tracing::{info, instrument};

use crate::actors::egress::{EgressPublisher, Publisher};
use crate::actors::enclosure::EnclosureAlertHandler;
use crate::actors::logging::LoggingModule;
use crate::actors::scheduler::{Scheduler, SchedulerHandle};
use crate::actors::service::ServiceRequestHandler;
use crate::actuators::CapabilityRegistry;
use crate::bus::{
    EGRESS_PUBLISHER, ENCLOSURE_ALERT_HANDLER, LOGGING_MODULE, MessageBus, SERVICE_REQUEST_HANDLER,
};
use crate::config::Config;
use crate::envelope::Envelope;
use crate::ingress;
use crate::lifecycle::LifecycleStore;

const HANDLER_PRIORITY: u8 = 1;

const SINK_PRIORITY: u8 = 5;

/// A running router
pub struct Router {
    bus: MessageBus,
    lifecycle: LifecycleStore,
    scheduler: SchedulerHandle,
}

impl Router {
    /// Wire and start every module
    #[instrument(skip_all)]
    pub fn start(
        config: &Config,
        registry: CapabilityRegistry,
        publisher: Box<dyn Publisher>,
    ) -> Result<Self> {
        let node = config.node.resolve();
        let incident_pattern = config.incident_regex()?;

        let bus = MessageBus::new();
        let lifecycle = LifecycleStore::with_imported(config.capabilities.iter().cloned());

        let scheduler = Scheduler::new(bus.clone())
            .add(
                EgressPublisher::new(publisher),
                config.module(EGRESS_PUBLISHER, SINK_PRIORITY),
            )?
            .add(
                LoggingModule::new(),
                config.module(LOGGING_MODULE, SINK_PRIORITY),
            )?
            .add(
                EnclosureAlertHandler::new(bus.clone(), node.clone()),
                config.module(ENCLOSURE_ALERT_HANDLER, HANDLER_PRIORITY),
            )?
            .add(
                ServiceRequestHandler::new(
                    bus.clone(),
                    node.clone(),
                    lifecycle.clone(),
                    registry,
                    incident_pattern,
                ),
                config.module(SERVICE_REQUEST_HANDLER, HANDLER_PRIORITY),
            )?
            .start()?;

        info!(
            "router started for host {} with modules {:?}",
            node.host_id,
            scheduler.names()
        );

        Ok(Self {
            bus,
            lifecycle,
            scheduler,
        })
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn lifecycle(&self) -> &LifecycleStore {
        &self.lifecycle
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    /// Hand an inbound envelope to its handler's queue
    pub fn ingest(&self, envelope: Envelope) -> Option<&'static str> {
        ingress::route(&self.bus, envelope)
    }

    /// Parse and hand over one inbound JSON line
    pub fn ingest_line(&self, line: &str) -> Option<&'static str> {
        ingress::route_line(&self.bus, line)
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
