//! Alert normalization
//!
//! Every FRU kind has a builder with the same signature and the same output shape;
//! only the default description and the key used to derive a resource id differ.
//! Builders are looked up through [`AlertBuilders::lookup`], which returns an explicit
//! [`BuilderLookup`] instead of failing.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use uuid::Uuid;

use crate::config::ResolvedNodeConfig;
use crate::envelope::{AlertInfo, RequestInfo, SensorAlertBody};
use crate::util::epoch_seconds;

/// Alert id: epoch seconds followed by a random 32 hex digit salt
pub fn new_alert_id(epoch: &str) -> String {
    format!("{epoch}{}", Uuid::new_v4().simple())
}

/// Severity implied by an alert type
pub fn map_severity(alert_type: &str) -> &'static str {
    match alert_type {
        "fault" | "missing" => "critical",
        "fault_resolved" | "insertion" => "informational",
        t if t.starts_with("threshold_breached") => "warning",
        _ => "informational",
    }
}

/// Field-replaceable unit kinds with an alert builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FruType {
    Sideplane,
    Fan,
    Psu,
    Controller,
    Disk,
    LogicalVolume,
}

impl FruType {
    pub const ALL: [FruType; 6] = [
        FruType::Sideplane,
        FruType::Fan,
        FruType::Psu,
        FruType::Controller,
        FruType::Disk,
        FruType::LogicalVolume,
    ];

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|fru| fru.key() == key)
    }

    /// Routing key, the third segment of `resource_type`
    pub fn key(&self) -> &'static str {
        match self {
            FruType::Sideplane => "sideplane",
            FruType::Fan => "fan",
            FruType::Psu => "psu",
            FruType::Controller => "controller",
            FruType::Disk => "disk",
            FruType::LogicalVolume => "logical_volume",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            FruType::Sideplane => "sideplane expander",
            FruType::Fan => "fan module",
            FruType::Psu => "power supply unit",
            FruType::Controller => "controller",
            FruType::Disk => "disk",
            FruType::LogicalVolume => "logical volume",
        }
    }

    /// `specific_info` key that identifies the unit
    fn id_key(&self) -> &'static str {
        match self {
            FruType::LogicalVolume => "volume-name",
            _ => "durable-id",
        }
    }
}

impl fmt::Display for FruType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Raw fields handed to a builder
#[derive(Debug, Clone, Default)]
pub struct AlertFields {
    pub host_id: Option<String>,
    pub alert_type: Option<String>,
    pub alert_id: Option<String>,
    pub severity: Option<String>,
    pub info: RequestInfo,
    pub specific_info: Value,
}

pub type AlertBuilder = fn(FruType, AlertFields, &ResolvedNodeConfig) -> SensorAlertBody;

/// Result of a builder lookup
#[derive(Debug, Clone, Copy)]
pub enum BuilderLookup {
    Found(FruType, AlertBuilder),
    NotFound,
}

/// Fixed table of per-FRU alert builders
#[derive(Debug, Clone)]
pub struct AlertBuilders {
    builders: HashMap<FruType, AlertBuilder>,
}

impl AlertBuilders {
    pub fn lookup(&self, key: &str) -> BuilderLookup {
        FruType::parse(key)
            .and_then(|fru| self.builders.get(&fru).map(|builder| (fru, *builder)))
            .map_or(BuilderLookup::NotFound, |(fru, builder)| {
                BuilderLookup::Found(fru, builder)
            })
    }
}

impl Default for AlertBuilders {
    fn default() -> Self {
        let builders = FruType::ALL
            .into_iter()
            .map(|fru| (fru, build_enclosure_alert as AlertBuilder))
            .collect();
        Self { builders }
    }
}

/// Build a normalized enclosure alert, filling missing fields from the node config
pub fn build_enclosure_alert(
    fru: FruType,
    fields: AlertFields,
    node: &ResolvedNodeConfig,
) -> SensorAlertBody {
    let AlertFields {
        host_id,
        alert_type,
        alert_id,
        severity,
        info,
        specific_info,
    } = fields;

    let epoch = epoch_seconds();
    let alert_type = alert_type.unwrap_or_else(|| "fault".to_string());
    let severity = severity.unwrap_or_else(|| map_severity(&alert_type).to_string());

    let resource_id = info.resource_id.unwrap_or_else(|| {
        specific_info
            .get(fru.id_key())
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| fru.key().to_string())
    });

    let description = info.description.unwrap_or_else(|| {
        format!(
            "The {} {resource_id} reported a {alert_type} event.",
            fru.label()
        )
    });

    SensorAlertBody {
        host_id: host_id.unwrap_or_else(|| node.host_id.clone()),
        alert_id: alert_id.unwrap_or_else(|| new_alert_id(&epoch)),
        alert_type,
        severity,
        info: AlertInfo {
            site_id: info.site_id.unwrap_or_else(|| node.site_id.clone()),
            cluster_id: info.cluster_id.unwrap_or_else(|| node.cluster_id.clone()),
            rack_id: info.rack_id.unwrap_or_else(|| node.rack_id.clone()),
            node_id: info.node_id.unwrap_or_else(|| node.node_id.clone()),
            resource_type: info.resource_type,
            resource_id,
            event_time: info.event_time.unwrap_or(epoch),
            description,
        },
        specific_info,
    }
}
