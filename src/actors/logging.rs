//! LoggingModule - writes incident log requests to the tracing log

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::bus::LOGGING_MODULE;
use crate::envelope::{ActuatorRequest, Envelope, LoggingRequest, Payload};

use super::MessageHandler;

/// Syslog-style level carried by a logging request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    /// Map a `LOG_*` level name; unknown names log at info
    pub fn parse(level: &str) -> Self {
        match level {
            "LOG_EMERG" | "LOG_ALERT" | "LOG_CRIT" | "LOG_ERR" => LogLevel::Error,
            "LOG_WARNING" => LogLevel::Warning,
            "LOG_DEBUG" => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoggingModule {
    logged: usize,
}

impl LoggingModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests written so far
    pub fn logged(&self) -> usize {
        self.logged
    }

    fn log(&mut self, request: &LoggingRequest) {
        let log_type = request.log_type.as_str();
        let message = request.log_msg.as_str();

        match LogLevel::parse(&request.log_level) {
            LogLevel::Error => error!(log_type, "{message}"),
            LogLevel::Warning => warn!(log_type, "{message}"),
            LogLevel::Info => info!(log_type, "{message}"),
            LogLevel::Debug => debug!(log_type, "{message}"),
        }
        self.logged += 1;
    }
}

#[async_trait]
impl MessageHandler for LoggingModule {
    fn name(&self) -> &'static str {
        LOGGING_MODULE
    }

    async fn handle(&mut self, envelope: Envelope) -> Result<()> {
        let Payload::ActuatorRequest(body) = &envelope.payload else {
            error!("not an actuator request: {:?}", envelope.kind());
            return Ok(());
        };

        match ActuatorRequest::parse(body) {
            Ok(ActuatorRequest::Logging(request)) => self.log(&request),
            Ok(other) => error!("unsupported request kind for logging: {}", other.tag()),
            Err(e) => error!("dropping logging request: {e}"),
        }

        Ok(())
    }
}
