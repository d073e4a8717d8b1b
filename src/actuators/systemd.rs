//! Service actuator backed by `systemctl`

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{Actuator, ActuatorOutcome};
use crate::envelope::ActuatorRequest;

const CONTROL_ACTIONS: [&str; 5] = ["start", "stop", "restart", "enable", "disable"];

#[derive(Debug, Clone)]
pub struct SystemdServiceActuator {
    systemctl: String,
}

impl SystemdServiceActuator {
    pub fn new() -> Self {
        Self {
            systemctl: "systemctl".to_string(),
        }
    }

    async fn systemctl(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.systemctl)
            .args(args)
            .output()
            .await
            .with_context(|| format!("failed to run {} {}", self.systemctl, args.join(" ")))?;

        if !output.status.success() {
            bail!(
                "{} {} exited with {}: {}",
                self.systemctl,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn query(&self, service_name: &str) -> Result<ActuatorOutcome> {
        let output = self
            .systemctl(&["show", service_name, "--property=ActiveState,SubState"])
            .await?;
        let (state, substate) = parse_show_output(&output);

        Ok(ActuatorOutcome {
            resource_name: service_name.to_string(),
            state,
            substate,
        })
    }
}

impl Default for SystemdServiceActuator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Actuator for SystemdServiceActuator {
    fn name(&self) -> &str {
        "systemd"
    }

    #[instrument(skip(self, request), fields(request = request.tag()))]
    async fn perform_request(&self, request: &ActuatorRequest) -> Result<ActuatorOutcome> {
        match request {
            ActuatorRequest::ServiceController(req) => {
                let action = req.service_request.as_str();
                if CONTROL_ACTIONS.contains(&action) {
                    debug!("{action} {}", req.service_name);
                    self.systemctl(&[action, &req.service_name]).await?;
                } else if action != "status" {
                    bail!("unsupported service request '{action}'");
                }
                self.query(&req.service_name).await
            }
            ActuatorRequest::ServiceWatchdog(req) => self.query(&req.service_name).await,
            ActuatorRequest::Logging(_) => bail!("logging requests are not service requests"),
        }
    }
}

/// Extract `ActiveState`/`SubState` from `systemctl show` output
fn parse_show_output(output: &str) -> (String, Option<String>) {
    let mut state = String::from("unknown");
    let mut substate = None;

    for line in output.lines() {
        match line.split_once('=') {
            Some(("ActiveState", value)) => state = value.trim().to_string(),
            Some(("SubState", value)) if !value.trim().is_empty() => {
                substate = Some(value.trim().to_string())
            }
            _ => {}
        }
    }

    (state, substate)
}
