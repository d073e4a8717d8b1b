//! EnclosureAlertHandler - routes enclosure sensor alerts by FRU type
//!
//! ## Routing
//!
//! ```text
//! enclosure_alert, status = true  → builder[fru] → cache[fru] = body → EgressPublisher
//! enclosure_alert, status = false → cache[fru] ──hit──→ EgressPublisher
//!                                              └─miss─→ log, drop
//! ```
//!
//! Unknown FRU types and malformed requests are logged and dropped here, so they
//! never reach the scheduler as turn faults.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, error, instrument, trace};

use crate::alerts::{AlertBuilders, AlertFields, BuilderLookup, FruType};
use crate::bus::{EGRESS_PUBLISHER, ENCLOSURE_ALERT_HANDLER, MessageBus};
use crate::config::ResolvedNodeConfig;
use crate::envelope::{EnclosureAlertRequest, Envelope, Payload, SensorAlertBody, SensorRequest};
use crate::error::RoutingError;
use crate::util::fru_segment;

use super::MessageHandler;

/// Last alert built for each FRU type
///
/// One entry per type, overwritten on every build, never expired.
#[derive(Debug, Clone, Default)]
pub struct AlertCache {
    entries: HashMap<FruType, SensorAlertBody>,
}

impl AlertCache {
    pub fn get(&self, fru: FruType) -> Option<&SensorAlertBody> {
        self.entries.get(&fru)
    }

    pub fn store(&mut self, fru: FruType, body: SensorAlertBody) {
        self.entries.insert(fru, body);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a single request resulted in
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    /// A new alert was built, cached and forwarded
    Published(FruType),

    /// A cached alert was forwarded for a replay query
    Replayed(FruType),

    /// Replay query for a type with no alert yet
    NoData(String),
}

pub struct EnclosureAlertHandler {
    bus: MessageBus,
    node: ResolvedNodeConfig,
    builders: AlertBuilders,
    cache: AlertCache,
}

impl EnclosureAlertHandler {
    pub fn new(bus: MessageBus, node: ResolvedNodeConfig) -> Self {
        Self {
            bus,
            node,
            builders: AlertBuilders::default(),
            cache: AlertCache::default(),
        }
    }

    pub fn cache(&self) -> &AlertCache {
        &self.cache
    }

    /// Route one sensor request body
    #[instrument(skip(self, body))]
    pub fn route(&mut self, body: &serde_json::Value) -> Result<AlertOutcome, RoutingError> {
        let SensorRequest::EnclosureAlert(request) = SensorRequest::parse(body)?;

        let key = fru_segment(&request.info.resource_type)
            .ok_or_else(|| {
                RoutingError::Malformed(format!(
                    "resource type '{}' has no fru segment",
                    request.info.resource_type
                ))
            })?
            .to_string();

        if request.status {
            self.propagate_alert(&key, request)
        } else {
            Ok(self.replay(&key))
        }
    }

    fn propagate_alert(
        &mut self,
        key: &str,
        request: EnclosureAlertRequest,
    ) -> Result<AlertOutcome, RoutingError> {
        let BuilderLookup::Found(fru, builder) = self.builders.lookup(key) else {
            return Err(RoutingError::UnknownFruType(key.to_string()));
        };

        let fields = AlertFields {
            host_id: request.host_id,
            alert_type: request.alert_type,
            alert_id: request.alert_id,
            severity: request.severity,
            info: request.info,
            specific_info: request.specific_info,
        };

        let body = builder(fru, fields, &self.node);
        trace!("built {fru} alert {}", body.alert_id);

        // served to later replay queries
        self.cache.store(fru, body.clone());
        self.bus.write(EGRESS_PUBLISHER, Envelope::sensor_response(body));

        Ok(AlertOutcome::Published(fru))
    }

    fn replay(&self, key: &str) -> AlertOutcome {
        match FruType::parse(key).and_then(|fru| self.cache.get(fru).map(|body| (fru, body))) {
            Some((fru, body)) => {
                self.bus.write(EGRESS_PUBLISHER, Envelope::sensor_response(body.clone()));
                AlertOutcome::Replayed(fru)
            }
            None => AlertOutcome::NoData(key.to_string()),
        }
    }
}

#[async_trait]
impl MessageHandler for EnclosureAlertHandler {
    fn name(&self) -> &'static str {
        ENCLOSURE_ALERT_HANDLER
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![EGRESS_PUBLISHER]
    }

    async fn handle(&mut self, envelope: Envelope) -> anyhow::Result<()> {
        let Payload::SensorRequest(body) = &envelope.payload else {
            error!("not a sensor request: {:?}", envelope.kind());
            return Ok(());
        };

        match self.route(body) {
            Ok(AlertOutcome::NoData(key)) => {
                debug!("no past data found for {key} sensor type");
            }
            Ok(outcome) => trace!("{outcome:?}"),
            Err(e) => error!("dropping sensor request: {e}"),
        }

        Ok(())
    }
}
