//! Helper functions for integration tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use hwmon_router::{
    actors::egress::CollectingPublisher,
    actuators::{Actuator, ActuatorOutcome, CapabilityRegistry, SERVICE_CAPABILITY},
    config::Config,
    envelope::{ActuatorRequest, Envelope, Payload, SensorAlertBody},
    router::Router,
};
use serde_json::json;

/// Service actuator reporting a fixed state for every service
pub struct FakeService {
    state: String,
    substate: String,
}

#[async_trait]
impl Actuator for FakeService {
    fn name(&self) -> &str {
        "fake-service"
    }

    async fn perform_request(&self, request: &ActuatorRequest) -> anyhow::Result<ActuatorOutcome> {
        let resource_name = match request {
            ActuatorRequest::ServiceController(r) => r.service_name.clone(),
            ActuatorRequest::ServiceWatchdog(r) => r.service_name.clone(),
            ActuatorRequest::Logging(_) => anyhow::bail!("not a service request"),
        };
        Ok(ActuatorOutcome {
            resource_name,
            state: self.state.clone(),
            substate: Some(self.substate.clone()),
        })
    }
}

pub struct TestRouter {
    pub router: Router,
    pub published: CollectingPublisher,
    pub constructed: Arc<AtomicUsize>,
}

impl TestRouter {
    /// Run turns until every queue is drained
    pub async fn flush(&self) {
        for _ in 0..3 {
            self.router.scheduler().turn_all().await;
        }
    }

    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn alerts(&self) -> Vec<SensorAlertBody> {
        self.published
            .published()
            .into_iter()
            .filter_map(|envelope| match envelope.payload {
                Payload::SensorResponse(body) => Some(body),
                _ => None,
            })
            .collect()
    }
}

pub fn create_test_config() -> Config {
    // long intervals so only explicit turns drain the queues
    serde_json::from_value(json!({
        "node": { "host_id": "it-host", "node_id": "SN07" },
        "modules": {
            "EgressPublisher": { "interval_ms": 3_600_000 },
            "LoggingModule": { "interval_ms": 3_600_000 },
            "EnclosureAlertHandler": { "interval_ms": 3_600_000 },
            "ServiceRequestHandler": { "interval_ms": 3_600_000 }
        }
    }))
    .unwrap()
}

pub fn start_router(state: &str, substate: &str) -> TestRouter {
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = constructed.clone();
    let state = state.to_string();
    let substate = substate.to_string();

    let registry = CapabilityRegistry::new().register(SERVICE_CAPABILITY, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeService {
            state: state.clone(),
            substate: substate.clone(),
        }) as Arc<dyn Actuator>)
    });

    let published = CollectingPublisher::new();
    let router = Router::start(
        &create_test_config(),
        registry,
        Box::new(published.clone()),
    )
    .unwrap();

    TestRouter {
        router,
        published,
        constructed,
    }
}

pub fn enclosure_alert_line(fru: &str, alert_type: &str) -> String {
    json!({ "sensor_request_type": { "enclosure_alert": {
        "status": true,
        "alert_type": alert_type,
        "info": { "resource_type": format!("enclosure:fru:{fru}") },
        "specific_info": { "durable-id": format!("{fru}_1.1"), "health": "Fault" }
    }}})
    .to_string()
}

pub fn enclosure_query(fru: &str) -> Envelope {
    Envelope::sensor_request(json!({ "enclosure_alert": {
        "status": false,
        "info": { "resource_type": format!("enclosure:fru:{fru}") }
    }}))
}

pub fn service_controller(service: &str, request: &str, uuid: &str) -> Envelope {
    Envelope::actuator_request(json!({ "service_controller": {
        "service_name": service,
        "service_request": request
    }}))
    .with_uuid(Some(uuid.to_string()))
}

pub fn service_watchdog(service: &str, state: &str, substate: &str, request: &str) -> Envelope {
    Envelope::actuator_request(json!({ "service_watchdog_controller": {
        "service_name": service,
        "state": state,
        "previous_state": "active",
        "substate": substate,
        "previous_substate": "running",
        "pid": "0",
        "previous_pid": "812",
        "service_request": request
    }}))
}
