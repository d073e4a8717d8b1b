use std::collections::HashMap;
use std::time::Duration;

use regex::Regex;
use tracing::trace;

use crate::error::{RouterError, RouterResult};
use crate::util::get_host_id;

/// Node identity stamped into every outbound alert
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct NodeConfig {
    pub host_id: Option<String>,
    pub site_id: Option<String>,
    pub cluster_id: Option<String>,
    pub rack_id: Option<String>,
    pub node_id: Option<String>,
}

/// Node identity with all defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNodeConfig {
    pub host_id: String,
    pub site_id: String,
    pub cluster_id: String,
    pub rack_id: String,
    pub node_id: String,
}

impl NodeConfig {
    pub fn resolve(&self) -> ResolvedNodeConfig {
        ResolvedNodeConfig {
            host_id: get_host_id(self.host_id.as_deref()),
            site_id: self.site_id.clone().unwrap_or_else(|| "DC01".to_string()),
            cluster_id: self.cluster_id.clone().unwrap_or_else(|| "CC01".to_string()),
            rack_id: self.rack_id.clone().unwrap_or_else(|| "RC01".to_string()),
            node_id: self.node_id.clone().unwrap_or_else(|| "SN01".to_string()),
        }
    }
}

/// Per-module scheduling settings
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ModuleConfig {
    pub priority: Option<u8>,
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModuleConfig {
    pub priority: u8,
    pub interval: Duration,
}

impl ModuleConfig {
    pub fn resolve(&self, default_priority: u8) -> ResolvedModuleConfig {
        ResolvedModuleConfig {
            priority: self.priority.unwrap_or(default_priority),
            interval: Duration::from_millis(self.interval_ms.unwrap_or(default_interval_ms())),
        }
    }
}

fn default_interval_ms() -> u64 {
    1000
}

/// Where the egress publisher sends outbound envelopes
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(tag = "sink", rename_all = "lowercase")]
pub enum EgressConfig {
    /// Newline-delimited JSON on stdout
    #[default]
    Stdout,

    /// HTTP POST of each envelope
    Webhook {
        url: String,
        /// Request timeout, 30 seconds if unset
        timeout_secs: Option<u64>,
    },
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,

    /// Capabilities that may be instantiated on first use
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,

    /// Scheduling overrides keyed by module name
    #[serde(default)]
    pub modules: HashMap<String, ModuleConfig>,

    #[serde(default)]
    pub egress: EgressConfig,

    /// Pattern that turns a watchdog state change into an incident
    #[serde(default = "default_incident_pattern")]
    pub incident_pattern: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            capabilities: default_capabilities(),
            modules: HashMap::new(),
            egress: EgressConfig::default(),
            incident_pattern: default_incident_pattern(),
        }
    }
}

fn default_capabilities() -> Vec<String> {
    vec!["Service".to_string()]
}

fn default_incident_pattern() -> String {
    "(?i)fail".to_string()
}

impl Config {
    /// Scheduling settings for a module, falling back to its built-in priority
    pub fn module(&self, name: &str, default_priority: u8) -> ResolvedModuleConfig {
        self.modules
            .get(name)
            .cloned()
            .unwrap_or_default()
            .resolve(default_priority)
    }

    pub fn incident_regex(&self) -> RouterResult<Regex> {
        Regex::new(&self.incident_pattern).map_err(|e| {
            RouterError::InvalidConfig(format!(
                "incident pattern '{}': {e}",
                self.incident_pattern
            ))
        })
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
