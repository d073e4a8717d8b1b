//! EgressPublisher - hands outbound envelopes to the configured sink
//!
//! The publisher is the last hop before the broker. Envelopes are forwarded
//! verbatim. A failed publish is logged and the envelope is dropped; there is
//! no retry.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, instrument};

use crate::bus::EGRESS_PUBLISHER;
use crate::config::EgressConfig;
use crate::envelope::Envelope;

use super::MessageHandler;

/// A sink for outbound envelopes
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, envelope: &Envelope) -> Result<()>;
}

/// Newline-delimited JSON on stdout
#[derive(Debug, Default)]
pub struct StdoutPublisher;

#[async_trait]
impl Publisher for StdoutPublisher {
    async fn publish(&self, envelope: &Envelope) -> Result<()> {
        let mut line = serde_json::to_vec(envelope)?;
        line.push(b'\n');

        let mut stdout = tokio::io::stdout();
        stdout.write_all(&line).await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// HTTP POST of every envelope as a JSON body
#[derive(Debug, Clone)]
pub struct WebhookPublisher {
    client: Client,
    url: String,
}

/// Upper bound for a single webhook request
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

impl WebhookPublisher {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    #[instrument(skip(self, envelope), fields(url = %self.url))]
    async fn publish(&self, envelope: &Envelope) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(envelope)
            .send()
            .await
            .context("webhook request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("webhook returned {status}: {error_text}");
            return Err(anyhow!("webhook returned {status}"));
        }

        debug!("published {:?} envelope", envelope.kind());
        Ok(())
    }
}

/// Keeps every published envelope in memory
#[derive(Debug, Clone, Default)]
pub struct CollectingPublisher {
    published: Arc<Mutex<Vec<Envelope>>>,
}

impl CollectingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, oldest first
    pub fn published(&self) -> Vec<Envelope> {
        self.published
            .lock()
            .map(|published| published.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Publisher for CollectingPublisher {
    async fn publish(&self, envelope: &Envelope) -> Result<()> {
        self.published
            .lock()
            .map_err(|_| anyhow!("collector poisoned"))?
            .push(envelope.clone());
        Ok(())
    }
}

/// Build the publisher selected by `config`
pub fn publisher_from_config(config: &EgressConfig) -> Result<Box<dyn Publisher>> {
    Ok(match config {
        EgressConfig::Stdout => Box::new(StdoutPublisher),
        EgressConfig::Webhook { url, timeout_secs } => Box::new(WebhookPublisher::with_timeout(
            url.clone(),
            timeout_secs.map_or(DEFAULT_WEBHOOK_TIMEOUT, Duration::from_secs),
        )?),
    })
}

pub struct EgressPublisher {
    publisher: Box<dyn Publisher>,
    failed: usize,
}

impl EgressPublisher {
    pub fn new(publisher: Box<dyn Publisher>) -> Self {
        Self {
            publisher,
            failed: 0,
        }
    }

    /// Envelopes dropped because the sink rejected them
    pub fn failed(&self) -> usize {
        self.failed
    }
}

#[async_trait]
impl MessageHandler for EgressPublisher {
    fn name(&self) -> &'static str {
        EGRESS_PUBLISHER
    }

    async fn handle(&mut self, envelope: Envelope) -> Result<()> {
        if let Err(e) = self.publisher.publish(&envelope).await {
            self.failed += 1;
            error!("dropping {:?} envelope: {e:#}", envelope.kind());
        }
        Ok(())
    }
}
