//! ServiceRequestHandler - service control and service watchdog requests
//!
//! ## Capability Acquisition
//!
//! Both request kinds reach the `"Service"` actuator through the same guard:
//!
//! ```text
//! Initialized  → use the live instance
//! Initializing → BUSY (controller replies, watchdog forwards the reported state)
//! Imported     → begin_initializing → construct → execute → complete
//! NotLoaded    → warn, no reply
//! ```
//!
//! Construction therefore happens at most once per process, whichever path
//! gets there first.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::actuators::{Actuator, ActuatorOutcome, CapabilityRegistry, SERVICE_CAPABILITY};
use crate::alerts::{map_severity, new_alert_id};
use crate::bus::{EGRESS_PUBLISHER, LOGGING_MODULE, MessageBus, SERVICE_REQUEST_HANDLER};
use crate::config::ResolvedNodeConfig;
use crate::envelope::{
    ActuatorRequest, ActuatorResponseBody, AlertInfo, Envelope, Payload, SensorAlertBody,
    ServiceControllerRequest, ServiceWatchdogRequest,
};
use crate::error::RoutingError;
use crate::lifecycle::{CapabilityState, LifecycleStore};
use crate::util::epoch_seconds;

use super::MessageHandler;

/// `errno` value reported in BUSY acknowledgements
pub const EBUSY: i32 = 16;

const WATCHDOG_RESOURCE_TYPE: &str = "node:os:service_watchdog";

const WATCHDOG_ALERT_TYPE: &str = "fault";

/// What a single request resulted in
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceOutcome {
    /// The request ran against the actuator and a reply was sent
    Executed,

    /// The capability is mid-construction; a BUSY ack was sent
    Busy,

    /// The capability cannot be used; nothing was sent
    Unavailable(CapabilityState),

    /// A watchdog envelope was forwarded, plus an incident if `incident`
    Watchdog { incident: bool },

    /// Request dropped without output
    Dropped(RoutingError),
}

enum Acquired {
    /// Already initialized instance
    Live(Arc<dyn Actuator>),

    /// Constructed by this call; the caller must `complete` it
    Constructed(Arc<dyn Actuator>),

    Busy,

    Unavailable(CapabilityState),
}

pub struct ServiceRequestHandler {
    bus: MessageBus,
    node: ResolvedNodeConfig,
    lifecycle: LifecycleStore,
    registry: CapabilityRegistry,
    incident_pattern: Regex,
}

impl ServiceRequestHandler {
    pub fn new(
        bus: MessageBus,
        node: ResolvedNodeConfig,
        lifecycle: LifecycleStore,
        registry: CapabilityRegistry,
        incident_pattern: Regex,
    ) -> Self {
        Self {
            bus,
            node,
            lifecycle,
            registry,
            incident_pattern,
        }
    }

    /// Route one actuator request body
    #[instrument(skip(self, body))]
    pub async fn route(&self, uuid: Option<String>, body: &Value) -> Result<ServiceOutcome> {
        let request = match ActuatorRequest::parse(body) {
            Ok(request) => request,
            Err(e) => return Ok(ServiceOutcome::Dropped(e)),
        };

        match request {
            ActuatorRequest::ServiceController(req) => self.service_controller(req, uuid).await,
            ActuatorRequest::ServiceWatchdog(req) => self.service_watchdog(req).await,
            other => Ok(ServiceOutcome::Dropped(RoutingError::UnsupportedRequest(
                other.tag().to_string(),
            ))),
        }
    }

    async fn acquire(&self) -> Acquired {
        match self.lifecycle.state(SERVICE_CAPABILITY).await {
            CapabilityState::Initialized => match self.lifecycle.instance(SERVICE_CAPABILITY).await
            {
                Some(actuator) => Acquired::Live(actuator),
                None => Acquired::Unavailable(CapabilityState::Initialized),
            },
            CapabilityState::Initializing => Acquired::Busy,
            CapabilityState::Imported => {
                if !self.lifecycle.begin_initializing(SERVICE_CAPABILITY).await {
                    return Acquired::Busy;
                }

                info!("service actuator is imported and initializing");
                match self.registry.construct(SERVICE_CAPABILITY) {
                    Ok(actuator) => {
                        info!("service actuator {} constructed", actuator.name());
                        Acquired::Constructed(actuator)
                    }
                    Err(e) => {
                        error!("service actuator could not be constructed: {e:#}");
                        self.lifecycle.abort(SERVICE_CAPABILITY).await;
                        Acquired::Unavailable(CapabilityState::Imported)
                    }
                }
            }
            CapabilityState::NotLoaded => Acquired::Unavailable(CapabilityState::NotLoaded),
        }
    }

    /// Run `request`; a freshly constructed actuator is marked initialized afterwards
    async fn perform(
        &self,
        actuator: Acquired,
        request: &ActuatorRequest,
    ) -> Result<Option<ActuatorOutcome>> {
        match actuator {
            Acquired::Live(actuator) => Ok(Some(actuator.perform_request(request).await?)),
            Acquired::Constructed(actuator) => {
                let result = actuator.perform_request(request).await;
                self.lifecycle.complete(SERVICE_CAPABILITY, actuator).await;
                Ok(Some(result?))
            }
            Acquired::Busy | Acquired::Unavailable(_) => Ok(None),
        }
    }

    async fn service_controller(
        &self,
        req: ServiceControllerRequest,
        uuid: Option<String>,
    ) -> Result<ServiceOutcome> {
        let request_label = format!("{}:{}", req.service_request, req.service_name);
        let actuator = self.acquire().await;

        match actuator {
            Acquired::Busy => {
                info!("service actuator is initializing, {request_label} is busy");
                let ack = ActuatorResponseBody::Ack {
                    ack_msg: request_label,
                    ack_type: "BUSY".to_string(),
                    error_no: EBUSY,
                };
                self.bus
                    .write(EGRESS_PUBLISHER, Envelope::actuator_response(ack).with_uuid(uuid));
                Ok(ServiceOutcome::Busy)
            }
            Acquired::Unavailable(state) => {
                warn!("service actuator is not loaded or not supported ({state})");
                Ok(ServiceOutcome::Unavailable(state))
            }
            acquired => {
                let request = ActuatorRequest::ServiceController(req);
                let outcome = self
                    .perform(acquired, &request)
                    .await
                    .with_context(|| format!("service request {request_label} failed"))?
                    .context("service actuator produced no result")?;

                let response = outcome.response();
                debug!("service_name: {}, result: {response}", outcome.resource_name);

                let body = ActuatorResponseBody::ServiceController {
                    service_name: outcome.resource_name,
                    service_response: response,
                };
                self.bus
                    .write(EGRESS_PUBLISHER, Envelope::actuator_response(body).with_uuid(uuid));
                Ok(ServiceOutcome::Executed)
            }
        }
    }

    async fn service_watchdog(&self, mut req: ServiceWatchdogRequest) -> Result<ServiceOutcome> {
        if req.wants_refresh() {
            let request = ActuatorRequest::ServiceWatchdog(req.clone());
            match self.acquire().await {
                Acquired::Busy => debug!("service actuator is initializing, using reported state"),
                Acquired::Unavailable(state) => {
                    warn!("service actuator unavailable ({state}), using reported state")
                }
                acquired => {
                    if let Some(outcome) = self.perform(acquired, &request).await? {
                        trace!(
                            "refreshed {}: {} -> {}",
                            outcome.resource_name,
                            req.state,
                            outcome.response()
                        );
                        req.service_name = outcome.resource_name;
                        req.state = outcome.state;
                        req.substate = outcome.substate.unwrap_or_default();
                    }
                }
            }
        }

        let alert = self.watchdog_alert(&req)?;
        self.bus.write(EGRESS_PUBLISHER, Envelope::sensor_response(alert));

        let incident = self.is_failure(&req);
        if incident {
            self.bus.write(LOGGING_MODULE, incident_envelope(&req)?);
        }

        Ok(ServiceOutcome::Watchdog { incident })
    }

    fn is_failure(&self, req: &ServiceWatchdogRequest) -> bool {
        self.incident_pattern.is_match(&req.state) || self.incident_pattern.is_match(&req.substate)
    }

    fn watchdog_alert(&self, req: &ServiceWatchdogRequest) -> Result<SensorAlertBody> {
        let epoch = epoch_seconds();
        let description = format!(
            "{} changed its state from {}:{} to {}:{}",
            req.service_name, req.previous_state, req.previous_substate, req.state, req.substate
        );

        Ok(SensorAlertBody {
            host_id: self.node.host_id.clone(),
            alert_type: WATCHDOG_ALERT_TYPE.to_string(),
            alert_id: new_alert_id(&epoch),
            severity: map_severity(WATCHDOG_ALERT_TYPE).to_string(),
            info: AlertInfo {
                site_id: self.node.site_id.clone(),
                cluster_id: self.node.cluster_id.clone(),
                rack_id: self.node.rack_id.clone(),
                node_id: self.node.node_id.clone(),
                resource_type: WATCHDOG_RESOURCE_TYPE.to_string(),
                resource_id: req.service_name.clone(),
                event_time: epoch,
                description,
            },
            specific_info: serde_json::to_value(req)?,
        })
    }
}

/// Incident envelope for the logging module
fn incident_envelope(req: &ServiceWatchdogRequest) -> Result<Envelope> {
    let fields: BTreeMap<&str, Value> = BTreeMap::from([
        ("service_name", json!(req.service_name)),
        ("state", json!(req.state)),
        ("previous_state", json!(req.previous_state)),
        ("substate", json!(req.substate)),
        ("previous_substate", json!(req.previous_substate)),
        ("pid", req.pid.clone()),
        ("previous_pid", req.previous_pid.clone()),
    ]);

    Ok(Envelope::actuator_request(json!({
        "logging": {
            "log_level": "LOG_WARNING",
            "log_type": "IEM",
            "log_msg": format!(
                "IEC: 020003001: Service entered a Failed state : {}",
                serde_json::to_string(&fields)?
            ),
        }
    })))
}

#[async_trait]
impl MessageHandler for ServiceRequestHandler {
    fn name(&self) -> &'static str {
        SERVICE_REQUEST_HANDLER
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![EGRESS_PUBLISHER, LOGGING_MODULE]
    }

    async fn handle(&mut self, envelope: Envelope) -> Result<()> {
        let uuid = envelope.uuid().map(str::to_string);
        let Payload::ActuatorRequest(body) = &envelope.payload else {
            error!("not an actuator request: {:?}", envelope.kind());
            return Ok(());
        };

        match self.route(uuid, body).await? {
            ServiceOutcome::Dropped(e) => error!("dropping actuator request: {e}"),
            outcome => trace!("{outcome:?}"),
        }

        Ok(())
    }
}
