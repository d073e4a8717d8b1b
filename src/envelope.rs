//! Envelope types exchanged over the bus and with the broker
//!
//! Request bodies travel as raw JSON and are parsed by the module that owns them,
//! so a malformed request only ever costs that one envelope.
//! Response bodies are typed; they are built inside this process.
//!
//! ## Wire Shape
//!
//! ```text
//! { "message_header": { "uuid": "..." },          (optional)
//!   "sensor_request_type" | "sensor_response_type"
//!   | "actuator_request_type" | "actuator_response_type": { ... } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RoutingError;

const ENCLOSURE_ALERT: &str = "enclosure_alert";

const SERVICE_CONTROLLER: &str = "service_controller";

const SERVICE_WATCHDOG: &str = "service_watchdog_controller";

const LOGGING: &str = "logging";

/// Coarse envelope classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    SensorRequest,
    SensorResponse,
    ActuatorRequest,
    ActuatorResponse,
}

/// Optional header carrying the correlation id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

/// A message on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(
        rename = "message_header",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub header: Option<MessageHeader>,

    #[serde(flatten)]
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    #[serde(rename = "sensor_request_type")]
    SensorRequest(Value),

    #[serde(rename = "sensor_response_type")]
    SensorResponse(SensorAlertBody),

    #[serde(rename = "actuator_request_type")]
    ActuatorRequest(Value),

    #[serde(rename = "actuator_response_type")]
    ActuatorResponse(ActuatorResponseBody),
}

impl Envelope {
    pub fn new(payload: Payload) -> Self {
        Self {
            header: None,
            payload,
        }
    }

    pub fn sensor_request(body: Value) -> Self {
        Self::new(Payload::SensorRequest(body))
    }

    pub fn sensor_response(body: SensorAlertBody) -> Self {
        Self::new(Payload::SensorResponse(body))
    }

    pub fn actuator_request(body: Value) -> Self {
        Self::new(Payload::ActuatorRequest(body))
    }

    pub fn actuator_response(body: ActuatorResponseBody) -> Self {
        Self::new(Payload::ActuatorResponse(body))
    }

    /// Attach a correlation id; `None` leaves the envelope untouched
    pub fn with_uuid(mut self, uuid: Option<String>) -> Self {
        if let Some(uuid) = uuid {
            self.header = Some(MessageHeader { uuid: Some(uuid) });
        }
        self
    }

    pub fn uuid(&self) -> Option<&str> {
        self.header.as_ref().and_then(|h| h.uuid.as_deref())
    }

    pub fn kind(&self) -> EnvelopeKind {
        match self.payload {
            Payload::SensorRequest(_) => EnvelopeKind::SensorRequest,
            Payload::SensorResponse(_) => EnvelopeKind::SensorResponse,
            Payload::ActuatorRequest(_) => EnvelopeKind::ActuatorRequest,
            Payload::ActuatorResponse(_) => EnvelopeKind::ActuatorResponse,
        }
    }

    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Normalized alert published as a sensor response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorAlertBody {
    pub host_id: String,
    pub alert_type: String,
    pub alert_id: String,
    pub severity: String,
    pub info: AlertInfo,
    pub specific_info: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertInfo {
    pub site_id: String,
    pub cluster_id: String,
    pub rack_id: String,
    pub node_id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub event_time: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorResponseBody {
    /// Result of a start/stop/restart/status request
    ServiceController {
        service_name: String,
        service_response: String,
    },

    /// Acknowledgement carrying an explicit error code
    Ack {
        ack_msg: String,
        ack_type: String,
        error_no: i32,
    },
}

/// First of `tags` present in `body`, checked in the given order
///
/// Other keys are ignored. A body carrying none of `tags` is unsupported.
fn find_tag<'a>(
    body: &'a Value,
    tags: &[&'static str],
) -> Result<(&'static str, &'a Value), RoutingError> {
    let map = body
        .as_object()
        .filter(|map| !map.is_empty())
        .ok_or_else(|| RoutingError::Malformed("expected a tagged request object".to_string()))?;

    tags.iter()
        .find_map(|tag| map.get(*tag).map(|inner| (*tag, inner)))
        .ok_or_else(|| {
            let keys = map.keys().map(String::as_str).collect::<Vec<_>>();
            RoutingError::UnsupportedRequest(keys.join(","))
        })
}

// ============================================================================
// Sensor requests
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SensorRequest {
    EnclosureAlert(EnclosureAlertRequest),
}

impl SensorRequest {
    pub fn parse(body: &Value) -> Result<Self, RoutingError> {
        let (_, inner) = find_tag(body, &[ENCLOSURE_ALERT])?;
        Ok(SensorRequest::EnclosureAlert(serde_json::from_value(inner.clone())?))
    }
}

/// `enclosure_alert` request; `status = false` marks a replay query
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnclosureAlertRequest {
    #[serde(default)]
    pub status: bool,
    pub host_id: Option<String>,
    pub alert_type: Option<String>,
    pub alert_id: Option<String>,
    pub severity: Option<String>,
    pub info: RequestInfo,
    #[serde(default = "empty_object")]
    pub specific_info: Value,
}

/// Inbound `info` block; only `resource_type` is mandatory
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RequestInfo {
    pub resource_type: String,
    pub site_id: Option<String>,
    pub cluster_id: Option<String>,
    pub rack_id: Option<String>,
    pub node_id: Option<String>,
    pub resource_id: Option<String>,
    pub event_time: Option<String>,
    pub description: Option<String>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

// ============================================================================
// Actuator requests
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorRequest {
    ServiceController(ServiceControllerRequest),
    ServiceWatchdog(ServiceWatchdogRequest),
    Logging(LoggingRequest),
}

impl ActuatorRequest {
    pub fn parse(body: &Value) -> Result<Self, RoutingError> {
        let (tag, inner) = find_tag(body, &[SERVICE_CONTROLLER, SERVICE_WATCHDOG, LOGGING])?;
        let inner = inner.clone();

        Ok(match tag {
            SERVICE_CONTROLLER => {
                ActuatorRequest::ServiceController(serde_json::from_value(inner)?)
            }
            SERVICE_WATCHDOG => {
                ActuatorRequest::ServiceWatchdog(serde_json::from_value(inner)?)
            }
            _ => ActuatorRequest::Logging(serde_json::from_value(inner)?),
        })
    }

    /// Tag name as it appears on the wire
    pub fn tag(&self) -> &'static str {
        match self {
            ActuatorRequest::ServiceController(_) => SERVICE_CONTROLLER,
            ActuatorRequest::ServiceWatchdog(_) => SERVICE_WATCHDOG,
            ActuatorRequest::Logging(_) => LOGGING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceControllerRequest {
    pub service_name: String,
    pub service_request: String,
}

/// State transition reported by a service watchdog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceWatchdogRequest {
    pub service_name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub previous_state: String,
    #[serde(default)]
    pub substate: String,
    #[serde(default)]
    pub previous_substate: String,
    #[serde(default)]
    pub pid: Value,
    #[serde(default)]
    pub previous_pid: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_request: Option<String>,
}

impl ServiceWatchdogRequest {
    /// Whether the event asks for a fresh state query
    pub fn wants_refresh(&self) -> bool {
        self.service_request
            .as_deref()
            .is_some_and(|r| !r.is_empty() && r != "None")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingRequest {
    pub log_level: String,
    pub log_type: String,
    pub log_msg: String,
}
