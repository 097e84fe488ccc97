//! Runtime integration – `SyncAgent` drives a [`SyncScheduler`] at a fixed
//! tick rate and delivers its output over per-observer tokio channels.
//!
//! ## Event contract (inbound)
//!
//! | Command                | Payload keys  | Effect                         |
//! |------------------------|---------------|--------------------------------|
//! | `sync.observer.join`   | id, x, y, z   | rejected; see connect_observer |
//! | `sync.observer.leave`  | id            | observer removed next tick     |
//! | `sync.observer.move`   | id, x, y, z   | observer position updated      |
//!
//! ## Event contract (outbound, per observer channel)
//!
//! Every message is a JSON `SyncEvent<SyncMessage>` whose `frame` is the
//! scheduler tick that produced it.

use crate::ingress::CommandSender;
use crate::protocol::ObserverCommand;
use crate::scheduler::{SyncScheduler, TickReport};
use crate::transport::ChannelTransport;
use crate::types::ObserverId;
use anyhow::{bail, Context, Result};
use bytes::Bytes;
use log::{debug, info};
use std::future::Future;
use tokio::sync::mpsc::UnboundedReceiver;

// ---------------------------------------------------------------------------
// Physics hook
// ---------------------------------------------------------------------------

/// The physics/path collaborator. Called on the simulation thread right
/// before each tick to write live state into the scheduler.
pub trait MotionSource: Send {
    fn advance(&mut self, tick: u64, scheduler: &mut SyncScheduler);
}

// ---------------------------------------------------------------------------
// Config for SyncAgent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SyncAgentConfig {
    /// Session name stamped on every outbound envelope.
    pub session: String,
    /// Tick rate in Hz.
    pub tick_rate_hz: f32,
}

impl Default for SyncAgentConfig {
    fn default() -> Self {
        Self {
            session: "default".into(),
            tick_rate_hz: 20.0,
        }
    }
}

// ---------------------------------------------------------------------------
// SyncAgent
// ---------------------------------------------------------------------------

pub struct SyncAgent {
    config: SyncAgentConfig,
    scheduler: SyncScheduler,
    transport: ChannelTransport,
    motion: Box<dyn MotionSource>,
    commands: CommandSender,
}

impl SyncAgent {
    pub fn new(
        config: SyncAgentConfig,
        scheduler: SyncScheduler,
        motion: Box<dyn MotionSource>,
    ) -> Self {
        let transport = ChannelTransport::new(config.session.clone());
        let commands = scheduler.command_sender();
        Self {
            config,
            scheduler,
            transport,
            motion,
            commands,
        }
    }

    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut SyncScheduler {
        &mut self.scheduler
    }

    /// Handle network threads use to queue observer commands.
    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    // -----------------------------------------------------------------------
    // Observer sessions
    // -----------------------------------------------------------------------

    /// Open a channel for `id` and queue its join. The observer is spawned
    /// into view on the next tick.
    pub fn connect_observer(&mut self, id: u64, x: f64, y: f64, z: f64) -> UnboundedReceiver<Bytes> {
        let rx = self.transport.register(ObserverId(id));
        self.commands.join(id, x, y, z);
        rx
    }

    pub fn disconnect_observer(&mut self, id: u64) {
        self.transport.unregister(ObserverId(id));
        self.commands.leave(id);
    }

    pub fn move_observer(&mut self, id: u64, x: f64, y: f64, z: f64) {
        self.commands.move_to(id, x, y, z);
    }

    /// Apply a JSON-encoded [`ObserverCommand`] from the bus.
    ///
    /// Joins are refused: an observer needs a channel, which only
    /// [`SyncAgent::connect_observer`] can open.
    pub fn handle_command(&mut self, payload: &[u8]) -> Result<()> {
        let command: ObserverCommand =
            serde_json::from_slice(payload).context("Invalid observer command payload")?;
        debug!("Received {}", command.subject());
        match command {
            ObserverCommand::Join { id, .. } => {
                bail!("observer {} must join through connect_observer", id)
            }
            ObserverCommand::Leave { id } => {
                self.transport.unregister(ObserverId(id));
            }
            ObserverCommand::Move { .. } => {}
        }
        self.commands.send(command);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    /// Advance physics, then run one sync tick.
    pub fn step(&mut self) -> Result<TickReport> {
        let next = self.scheduler.current_tick() + 1;
        self.motion.advance(next, &mut self.scheduler);
        let report = self
            .scheduler
            .tick(&mut self.transport)
            .with_context(|| format!("Sync tick {} failed", next))?;
        Ok(report)
    }

    /// Tick at the configured rate until `shutdown` resolves.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        info!(
            "SyncAgent active in session '{}' – ticking at {:.0}Hz",
            self.config.session, self.config.tick_rate_hz
        );

        let interval = std::time::Duration::from_secs_f32(1.0 / self.config.tick_rate_hz);
        let mut timer = tokio::time::interval(interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("SyncAgent shutting down");
                    break;
                }
                _ = timer.tick() => {
                    let span = tracing::debug_span!("sync_tick", tick = self.scheduler.current_tick() + 1);
                    let report = span.in_scope(|| self.step())?;
                    if !report.failed_observers.is_empty() {
                        debug!("Tick {} lost {} observers", report.tick, report.failed_observers.len());
                    }
                }
            }
        }

        let stats = self.scheduler.stats();
        info!(
            "SyncAgent stopped after {} ticks ({} messages, {} send failures)",
            stats.total_ticks, stats.messages_sent, stats.send_failures
        );
        Ok(())
    }
}
