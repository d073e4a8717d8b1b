//! Integration tests for enclosure alerts
//!
//! Inbound sensor request → EnclosureAlertHandler → EgressPublisher

use hwmon_router::bus::{EGRESS_PUBLISHER, ENCLOSURE_ALERT_HANDLER};
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[tokio::test]
async fn test_psu_fault_reaches_egress() {
    let t = start_router("active", "running");

    let destination = t.router.ingest_line(&enclosure_alert_line("psu", "fault"));
    assert_eq!(destination, Some(ENCLOSURE_ALERT_HANDLER));
    t.flush().await;

    let alerts = t.alerts();
    assert_eq!(alerts.len(), 1);

    let alert = &alerts[0];
    assert_eq!(alert.host_id, "it-host");
    assert_eq!(alert.alert_type, "fault");
    assert_eq!(alert.severity, "critical");
    assert_eq!(alert.info.resource_type, "enclosure:fru:psu");
    assert_eq!(alert.info.resource_id, "psu_1.1");
    assert_eq!(alert.info.node_id, "SN07");
    assert_eq!(alert.info.site_id, "DC01");
    assert_eq!(
        alert.info.description,
        "The power supply unit psu_1.1 reported a fault event."
    );
    assert_eq!(alert.specific_info["health"], "Fault");
    assert!(t.router.bus().is_empty(EGRESS_PUBLISHER));

    t.router.shutdown().await;
}

#[tokio::test]
async fn test_replay_serves_cached_alert() {
    let t = start_router("active", "running");

    t.router.ingest_line(&enclosure_alert_line("fan", "threshold_breached:high"));
    t.flush().await;

    t.router.ingest(enclosure_query("fan"));
    t.router.ingest(enclosure_query("disk"));
    t.flush().await;

    let alerts = t.alerts();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].severity, "warning");
    assert_eq!(alerts[0], alerts[1]);

    t.router.shutdown().await;
}

#[tokio::test]
async fn test_unknown_fru_and_garbage_publish_nothing() {
    let t = start_router("active", "running");

    t.router.ingest_line(&enclosure_alert_line("toaster", "fault"));
    t.router.ingest_line("{\"sensor_request_type\": 42}");
    t.router.ingest_line("definitely not json");
    t.flush().await;

    assert!(t.published.published().is_empty());

    // the handler keeps working afterwards
    t.router.ingest_line(&enclosure_alert_line("disk", "missing"));
    t.flush().await;
    assert_eq!(t.alerts().len(), 1);

    t.router.shutdown().await;
}

#[tokio::test]
async fn test_every_alert_gets_a_fresh_id() {
    let t = start_router("active", "running");

    for _ in 0..20 {
        t.router.ingest_line(&enclosure_alert_line("controller", "fault"));
    }
    t.flush().await;

    let mut ids = t
        .alerts()
        .into_iter()
        .map(|alert| alert.alert_id)
        .collect::<Vec<_>>();
    assert_eq!(ids.len(), 20);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 20);

    t.router.shutdown().await;
}

#[tokio::test]
async fn test_psu_passthrough_and_identical_replay() {
    let t = start_router("active", "running");
    let specific_info = serde_json::json!({
        "serial-number": "PSU-SN-0042",
        "model": "PSU-800W",
        "health": "OK"
    });

    let line = serde_json::json!({ "sensor_request_type": { "enclosure_alert": {
        "status": true,
        "host_id": "encl-01",
        "alert_type": "insertion",
        "alert_id": "1700000000abc",
        "severity": "informational",
        "info": { "resource_type": "enclosure:fru:psu" },
        "specific_info": specific_info
    }}})
    .to_string();
    t.router.ingest_line(&line);
    t.flush().await;

    t.router.ingest(enclosure_query("psu"));
    t.flush().await;

    let published = t.published.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0], published[1]);

    let alerts = t.alerts();
    assert_eq!(alerts[0].host_id, "encl-01");
    assert_eq!(alerts[0].alert_id, "1700000000abc");
    assert_eq!(alerts[0].info.resource_type, "enclosure:fru:psu");
    assert_eq!(alerts[0].specific_info, specific_info);

    t.router.shutdown().await;
}

#[tokio::test]
async fn test_extra_keys_beside_the_request_tag() {
    let t = start_router("active", "running");

    let line = serde_json::json!({ "sensor_request_type": {
        "debug": { "trace": true },
        "enclosure_alert": {
            "status": true,
            "alert_type": "fault",
            "info": { "resource_type": "enclosure:fru:psu" },
            "specific_info": { "durable-id": "psu_2.1", "health": "Fault" }
        }
    }})
    .to_string();
    t.router.ingest_line(&line);
    t.flush().await;

    let alerts = t.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].info.resource_id, "psu_2.1");

    t.router.shutdown().await;
}
