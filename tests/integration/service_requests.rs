//! Integration tests for service control and watchdog requests

use assert_matches::assert_matches;
use hwmon_router::{
    actuators::SERVICE_CAPABILITY,
    bus::{LOGGING_MODULE, SERVICE_REQUEST_HANDLER},
    envelope::{ActuatorResponseBody, Payload},
    lifecycle::CapabilityState,
};
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[tokio::test]
async fn test_controller_reply_echoes_uuid() {
    let t = start_router("active", "running");

    let destination = t
        .router
        .ingest(service_controller("crond.service", "restart", "req-1"));
    assert_eq!(destination, Some(SERVICE_REQUEST_HANDLER));
    t.flush().await;

    let published = t.published.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].uuid(), Some("req-1"));
    assert_eq!(
        published[0].payload,
        Payload::ActuatorResponse(ActuatorResponseBody::ServiceController {
            service_name: "crond.service".to_string(),
            service_response: "active:running".to_string(),
        })
    );
    assert_eq!(
        t.router.lifecycle().state(SERVICE_CAPABILITY).await,
        CapabilityState::Initialized
    );

    t.router.shutdown().await;
}

#[tokio::test]
async fn test_capability_constructed_once_across_paths() {
    let t = start_router("active", "running");

    t.router
        .ingest(service_watchdog("sshd.service", "active", "running", "status"));
    for n in 0..5 {
        t.router
            .ingest(service_controller("sshd.service", "status", &format!("req-{n}")));
    }
    t.flush().await;

    assert_eq!(t.constructed(), 1);
    assert_eq!(t.published.published().len(), 6);

    t.router.shutdown().await;
}

#[tokio::test]
async fn test_busy_while_initializing() {
    let t = start_router("active", "running");
    t.router
        .lifecycle()
        .set_state(SERVICE_CAPABILITY, CapabilityState::Initializing)
        .await;

    t.router
        .ingest(service_controller("crond.service", "stop", "req-busy"));
    t.flush().await;

    let published = t.published.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].uuid(), Some("req-busy"));
    assert_matches!(
        &published[0].payload,
        Payload::ActuatorResponse(ActuatorResponseBody::Ack { ack_msg, ack_type, error_no: 16 })
            if ack_type == "BUSY" && ack_msg == "stop:crond.service"
    );
    assert_eq!(t.constructed(), 0);

    t.router.shutdown().await;
}

#[tokio::test]
async fn test_not_loaded_capability_stays_silent() {
    let t = start_router("active", "running");
    t.router
        .lifecycle()
        .set_state(SERVICE_CAPABILITY, CapabilityState::NotLoaded)
        .await;

    t.router
        .ingest(service_controller("crond.service", "start", "req-2"));
    t.flush().await;

    assert!(t.published.published().is_empty());
    assert_eq!(t.constructed(), 0);

    t.router.shutdown().await;
}

#[tokio::test]
async fn test_failed_watchdog_raises_incident() {
    let t = start_router("failed", "failed");

    // no refresh: the reported state is forwarded as is
    t.router
        .ingest(service_watchdog("crond.service", "failed", "failed", "None"));
    t.flush().await;

    let alerts = t.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].info.resource_type, "node:os:service_watchdog");
    assert_eq!(alerts[0].info.resource_id, "crond.service");
    assert_eq!(
        alerts[0].info.description,
        "crond.service changed its state from active:running to failed:failed"
    );

    // the incident went through the logging module and was consumed there
    assert!(t.router.bus().is_empty(LOGGING_MODULE));
    assert_eq!(t.constructed(), 0);

    t.router.shutdown().await;
}

#[tokio::test]
async fn test_watchdog_refresh_reports_actual_state() {
    let t = start_router("inactive", "dead");

    t.router
        .ingest(service_watchdog("crond.service", "active", "running", "status"));
    t.flush().await;

    let alerts = t.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].specific_info["state"], "inactive");
    assert_eq!(alerts[0].specific_info["substate"], "dead");
    assert_eq!(
        alerts[0].info.description,
        "crond.service changed its state from active:running to inactive:dead"
    );
    assert_eq!(t.constructed(), 1);

    t.router.shutdown().await;
}
