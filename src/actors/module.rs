//! ModuleActor - cooperative run/drain/reschedule wrapper for a handler
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → drain queue → handler.handle(envelope) → ... → queue empty → wait for next tick
//!     ↑
//!     └─── Commands (TurnNow, Suspend, Resume, GetState, Shutdown)
//! ```
//!
//! The loop is external to the handler: a turn never schedules the next one itself.
//! Commands stay live during a turn: `Shutdown` abandons the envelope in flight,
//! `GetState` is answered at once and anything else waits until the turn ends.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;

use anyhow::{Result, anyhow};
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, instrument, trace, warn};

use crate::bus::{MessageBus, QueueReader};
use crate::config::ResolvedModuleConfig;
use crate::error::RouterResult;

use super::MessageHandler;
use super::messages::{ModuleCommand, ModuleState, TurnReport};

/// Actor owning one handler and the reader of its queue
pub struct ModuleActor<H: MessageHandler> {
    handler: H,

    /// Released on shutdown
    reader: Option<QueueReader>,

    config: ResolvedModuleConfig,

    command_rx: mpsc::Receiver<ModuleCommand>,

    /// Commands received mid-turn, applied once the turn ends
    deferred: VecDeque<ModuleCommand>,

    stop_requested: bool,

    state: ModuleState,
}

impl<H: MessageHandler> ModuleActor<H> {
    pub fn new(
        handler: H,
        reader: QueueReader,
        config: ResolvedModuleConfig,
        command_rx: mpsc::Receiver<ModuleCommand>,
    ) -> Self {
        Self {
            handler,
            reader: Some(reader),
            config,
            command_rx,
            deferred: VecDeque::new(),
            stop_requested: false,
            state: ModuleState::Initialized,
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command is received or every handle is dropped.
    /// Turn faults never end the loop.
    #[instrument(skip(self), fields(module = self.handler.name()))]
    pub async fn run(mut self) {
        debug!(
            "starting module (priority {}, interval {:?})",
            self.config.priority, self.config.interval
        );

        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.stop_requested {
            if let Some(cmd) = self.deferred.pop_front() {
                self.apply(cmd).await;
                continue;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    self.turn().await;
                }

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        warn!("command channel closed, shutting down");
                        break;
                    };
                    self.apply(cmd).await;
                }
            }
        }

        self.release();
        debug!("module stopped");
    }

    async fn apply(&mut self, cmd: ModuleCommand) {
        match cmd {
            ModuleCommand::TurnNow { respond_to } => {
                let report = self.turn().await;
                let _ = respond_to.send(report);
            }

            ModuleCommand::Suspend => {
                debug!("suspending");
                self.state = ModuleState::Suspended;
            }

            ModuleCommand::Resume => {
                if self.state == ModuleState::Suspended {
                    debug!("resuming");
                    self.state = ModuleState::Running;
                }
            }

            ModuleCommand::GetState { respond_to } => {
                let _ = respond_to.send(self.state);
            }

            ModuleCommand::Shutdown => {
                debug!("received shutdown command");
                self.stop_requested = true;
            }
        }
    }

    /// Drain the queue completely, unless suspended
    async fn turn(&mut self) -> TurnReport {
        if self.state == ModuleState::Suspended {
            trace!("suspended, skipping turn");
            return TurnReport {
                skipped: true,
                ..Default::default()
            };
        }
        self.state = ModuleState::Running;

        let mut report = TurnReport::default();
        let Some(reader) = self.reader.as_mut() else {
            return report;
        };

        while let Some(envelope) = reader.read() {
            report.processed += 1;

            let handled = AssertUnwindSafe(self.handler.handle(envelope)).catch_unwind();
            let outcome = tokio::select! {
                outcome = handled => {
                    outcome.unwrap_or_else(|_| Err(anyhow!("handler panicked")))
                }

                _ = stop_signal(&mut self.command_rx, &mut self.deferred, self.state) => {
                    warn!("shutdown during a turn, in-flight envelope abandoned");
                    self.stop_requested = true;
                    break;
                }
            };

            if let Err(e) = outcome {
                error!(
                    "{} restarting turn, {} envelope(s) left for the next turn: {e:#}",
                    self.handler.name(),
                    reader.len()
                );
                report.faulted = true;
                break;
            }
        }

        if report.processed > 0 {
            trace!("turn processed {} envelope(s)", report.processed);
        }
        report
    }

    fn release(&mut self) {
        for cmd in self.deferred.drain(..) {
            if let ModuleCommand::GetState { respond_to } = cmd {
                let _ = respond_to.send(ModuleState::ShuttingDown);
            }
        }

        self.state = ModuleState::ShuttingDown;
        if let Some(reader) = self.reader.take() {
            let discarded = reader.close();
            if discarded > 0 {
                warn!("discarded {discarded} queued envelope(s) at shutdown");
            }
        }
    }
}

/// Resolves once `Shutdown` arrives or every handle is gone
///
/// Used while a handler is running. `GetState` is answered with `state`, other
/// commands are queued on `deferred`.
async fn stop_signal(
    command_rx: &mut mpsc::Receiver<ModuleCommand>,
    deferred: &mut VecDeque<ModuleCommand>,
    state: ModuleState,
) {
    while let Some(cmd) = command_rx.recv().await {
        match cmd {
            ModuleCommand::Shutdown => return,
            ModuleCommand::GetState { respond_to } => {
                let _ = respond_to.send(state);
            }
            other => deferred.push_back(other),
        }
    }
}

/// Handle for controlling a module actor
#[derive(Clone)]
pub struct ModuleHandle {
    sender: mpsc::Sender<ModuleCommand>,
    name: &'static str,
    priority: u8,
}

impl ModuleHandle {
    /// Register the handler's queue on `bus` and spawn its actor
    pub fn spawn<H: MessageHandler>(
        handler: H,
        bus: &MessageBus,
        config: ResolvedModuleConfig,
    ) -> RouterResult<Self> {
        let reader = bus.register(handler.name())?;
        Ok(Self::start(handler, reader, config))
    }

    /// Spawn an actor around an already registered queue
    pub fn start<H: MessageHandler>(
        handler: H,
        reader: QueueReader,
        config: ResolvedModuleConfig,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let name = handler.name();
        let priority = config.priority;

        let actor = ModuleActor::new(handler, reader, config, cmd_rx);
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            name,
            priority,
        }
    }

    /// Run a turn now and wait for its report
    pub async fn turn_now(&self) -> Result<TurnReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ModuleCommand::TurnNow { respond_to: tx })
            .await?;

        Ok(rx.await?)
    }

    pub async fn suspend(&self) {
        let _ = self.sender.send(ModuleCommand::Suspend).await;
    }

    pub async fn resume(&self) {
        let _ = self.sender.send(ModuleCommand::Resume).await;
    }

    /// Current state, or `None` once the actor has stopped
    pub async fn state(&self) -> Option<ModuleState> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ModuleCommand::GetState { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Request shutdown without waiting for it
    pub async fn shutdown(&self) {
        let _ = self.sender.send(ModuleCommand::Shutdown).await;
    }

    /// Resolves once the actor has stopped and released its queue
    pub async fn stopped(&self) {
        self.sender.closed().await;
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }
}

// ============================================================================
// Tests
// ============================================================================
