//! Ingress routing
//!
//! Inbound envelopes are written to the queue of the module that owns their kind:
//! sensor requests to the enclosure alert handler, actuator requests to the
//! service request handler. Responses are outbound-only and never accepted here.

use tracing::{trace, warn};

use crate::bus::{ENCLOSURE_ALERT_HANDLER, MessageBus, SERVICE_REQUEST_HANDLER};
use crate::envelope::{Envelope, EnvelopeKind};

/// Destination queue for an inbound envelope of `kind`
pub fn destination(kind: EnvelopeKind) -> Option<&'static str> {
    match kind {
        EnvelopeKind::SensorRequest => Some(ENCLOSURE_ALERT_HANDLER),
        EnvelopeKind::ActuatorRequest => Some(SERVICE_REQUEST_HANDLER),
        EnvelopeKind::SensorResponse | EnvelopeKind::ActuatorResponse => None,
    }
}

/// Route one inbound envelope; returns the destination it was written to
pub fn route(bus: &MessageBus, envelope: Envelope) -> Option<&'static str> {
    let kind = envelope.kind();
    let Some(destination) = destination(kind) else {
        warn!("ignoring inbound {kind:?} envelope");
        return None;
    };

    trace!("routing {kind:?} to {destination}");
    bus.write(destination, envelope);
    Some(destination)
}

/// Parse one JSON line and route it
pub fn route_line(bus: &MessageBus, line: &str) -> Option<&'static str> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match Envelope::from_json_str(line) {
        Ok(envelope) => route(bus, envelope),
        Err(e) => {
            warn!("discarding unparseable inbound message: {e}");
            None
        }
    }
}
