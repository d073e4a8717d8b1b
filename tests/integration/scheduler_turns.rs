//! Integration tests for module turns, suspension and shutdown

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hwmon_router::{
    actors::{MessageHandler, egress::Publisher, messages::ModuleState, module::ModuleHandle},
    actuators::CapabilityRegistry,
    bus::{EGRESS_PUBLISHER, ENCLOSURE_ALERT_HANDLER, MessageBus},
    config::ResolvedModuleConfig,
    envelope::{Envelope, Payload},
    router::Router,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::helpers::*;

/// Faults on every envelope carrying `"bad": true`
struct Picky {
    seen: Arc<Mutex<Vec<u64>>>,
}

#[async_trait]
impl MessageHandler for Picky {
    fn name(&self) -> &'static str {
        "Picky"
    }

    async fn handle(&mut self, envelope: Envelope) -> anyhow::Result<()> {
        let Payload::SensorRequest(body) = envelope.payload else {
            return Ok(());
        };
        self.seen
            .lock()
            .unwrap()
            .push(body["n"].as_u64().unwrap_or_default());

        if body.get("bad").is_some() {
            anyhow::bail!("bad envelope");
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_fault_defers_remainder_to_next_turn() {
    let bus = MessageBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let config = ResolvedModuleConfig {
        priority: 1,
        interval: Duration::from_secs(3600),
    };
    let handle = ModuleHandle::spawn(Picky { seen: seen.clone() }, &bus, config).unwrap();

    bus.write("Picky", Envelope::sensor_request(json!({ "n": 1, "bad": true })));
    bus.write("Picky", Envelope::sensor_request(json!({ "n": 2, "bad": true })));
    bus.write("Picky", Envelope::sensor_request(json!({ "n": 3 })));

    let first = handle.turn_now().await.unwrap();
    assert!(first.faulted);
    assert_eq!(first.processed, 1);

    let second = handle.turn_now().await.unwrap();
    assert!(second.faulted);
    assert_eq!(second.processed, 1);

    let third = handle.turn_now().await.unwrap();
    assert!(!third.faulted);
    assert_eq!(third.processed, 1);

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(handle.state().await, Some(ModuleState::Running));

    handle.shutdown().await;
    handle.stopped().await;
}

#[tokio::test]
async fn test_interval_drives_turns() {
    let bus = MessageBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let config = ResolvedModuleConfig {
        priority: 1,
        interval: Duration::from_millis(20),
    };
    let handle = ModuleHandle::spawn(Picky { seen: seen.clone() }, &bus, config).unwrap();

    bus.write("Picky", Envelope::sensor_request(json!({ "n": 9 })));

    let mut drained = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if bus.is_empty("Picky") {
            drained = true;
            break;
        }
    }
    assert!(drained);
    assert_eq!(*seen.lock().unwrap(), vec![9]);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_suspended_handler_holds_its_queue() {
    let t = start_router("active", "running");
    let enclosure = t.router.scheduler().module(ENCLOSURE_ALERT_HANDLER).unwrap();

    enclosure.suspend().await;
    assert_eq!(enclosure.state().await, Some(ModuleState::Suspended));

    t.router.ingest_line(&enclosure_alert_line("sideplane", "fault"));
    t.flush().await;
    assert!(t.published.published().is_empty());
    assert!(!t.router.bus().is_empty(ENCLOSURE_ALERT_HANDLER));

    enclosure.resume().await;
    t.flush().await;
    assert_eq!(t.alerts().len(), 1);

    t.router.shutdown().await;
}

#[tokio::test]
async fn test_modules_start_in_priority_order() {
    let t = start_router("active", "running");

    let names = t.router.scheduler().names();
    assert_eq!(names.len(), 4);

    let position = |name: &str| names.iter().position(|n| *n == name).unwrap();
    assert!(position(ENCLOSURE_ALERT_HANDLER) < position(EGRESS_PUBLISHER));

    t.router.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_drops_later_writes() {
    let t = start_router("active", "running");
    t.router.shutdown().await;

    t.router.ingest_line(&enclosure_alert_line("psu", "fault"));
    assert!(t.router.bus().is_empty(ENCLOSURE_ALERT_HANDLER));
    assert!(t.router.bus().resolve(EGRESS_PUBLISHER).is_err());
    assert!(t.published.published().is_empty());
}

/// Sink that never finishes a publish
struct StalledPublisher;

#[async_trait]
impl Publisher for StalledPublisher {
    async fn publish(&self, _envelope: &Envelope) -> anyhow::Result<()> {
        std::future::pending::<anyhow::Result<()>>().await
    }
}

#[tokio::test]
async fn test_shutdown_completes_with_a_stalled_sink() {
    let router = Router::start(
        &create_test_config(),
        CapabilityRegistry::new(),
        Box::new(StalledPublisher),
    )
    .unwrap();

    router.ingest_line(&enclosure_alert_line("psu", "fault"));
    router.ingest_line(&enclosure_alert_line("fan", "fault"));

    let scheduler = router.scheduler().clone();
    let turns = tokio::spawn(async move { scheduler.turn_all().await });

    // egress is stuck on the first alert once the second one waits behind it
    let bus = router.bus().clone();
    let stuck = async {
        while !bus.is_empty(ENCLOSURE_ALERT_HANDLER) || bus.is_empty(EGRESS_PUBLISHER) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), stuck)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let shutdown = tokio::time::timeout(Duration::from_secs(5), router.shutdown()).await;
    assert!(shutdown.is_ok());
    assert!(router.bus().resolve(EGRESS_PUBLISHER).is_err());

    let reports = tokio::time::timeout(Duration::from_secs(5), turns).await;
    assert!(reports.is_ok());
}
