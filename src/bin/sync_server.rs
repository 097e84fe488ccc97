//! janet-sync-server binary
//!
//! Runs the sync engine against a demo train of coupled carts on a looping
//! track, with a handful of in-process observers that mirror what a client
//! would see.
//!
//! ## Configuration (env / TOML via `config` crate, CLI via `clap`)
//!
//! | Key                           | Default   | Description                       |
//! |-------------------------------|-----------|-----------------------------------|
//! | `SYNC_SESSION`                | `default` | Session stamped on envelopes      |
//! | `SYNC_TICK_RATE_HZ`           | `20`      | Simulation / sync tick rate       |
//! | `SYNC_VISIBILITY_RADIUS`      | `16.0`    | Observer visibility radius        |
//! | `SYNC_DEFAULT_SYNC_INTERVAL`  | `1`       | Ticks between sync passes         |
//! | `SYNC_RESYNC_INTERVAL_TICKS`  | `400`     | Forced teleport period            |

use anyhow::{bail, Context, Result};
use clap::Parser;
use janet_sync::{
    agent::{MotionSource, SyncAgent, SyncAgentConfig},
    protocol::{SyncEvent, SyncMessage},
    CommandSender, ObjectDescriptor, ObjectId, ObserverMirror, Orientation, RenderKind,
    SyncConfig, SyncScheduler, Vec3,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "janet-sync-server", about = "Janet Sync Engine", version)]
struct Args {
    /// Optional TOML file with `SyncConfig` overrides
    #[arg(long, env = "SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Session name stamped on every envelope
    #[arg(long, env = "SYNC_SESSION", default_value = "default")]
    session: String,

    /// Tick rate (Hz)
    #[arg(long, env = "SYNC_TICK_RATE_HZ", default_value_t = 20.0)]
    tick_rate_hz: f32,

    /// Visibility radius override (world units)
    #[arg(long)]
    radius: Option<f64>,

    /// Carts in the demo train
    #[arg(long, default_value_t = 4)]
    carts: usize,

    /// Stationary demo observers spread along the track
    #[arg(long, default_value_t = 3)]
    observers: u64,

    /// Stop after this many ticks instead of waiting for Ctrl-C
    #[arg(long)]
    ticks: Option<u64>,
}

// ---------------------------------------------------------------------------
// Demo physics
// ---------------------------------------------------------------------------

const TRACK_LENGTH: f64 = 200.0;
const CART_SPACING: f64 = 1.5;
const SPEED_PER_TICK: f64 = 0.4;

/// A train running along a gently curving track that loops back to the
/// start (which the engine sees as a teleport).
struct TrackSimulation {
    carts: Vec<ObjectId>,
    head: f64,
}

impl TrackSimulation {
    fn track_point(distance: f64) -> (Vec3, f32) {
        let y = 4.0 * (distance / 20.0).sin();
        let slope = 0.2 * (distance / 20.0).cos();
        let yaw = slope.atan().to_degrees() as f32;
        (Vec3::new(distance, y, 0.0), yaw)
    }
}

impl MotionSource for TrackSimulation {
    fn advance(&mut self, tick: u64, scheduler: &mut SyncScheduler) {
        self.head = (self.head + SPEED_PER_TICK) % TRACK_LENGTH;
        for (i, &cart) in self.carts.iter().enumerate() {
            let distance = (self.head - i as f64 * CART_SPACING).rem_euclid(TRACK_LENGTH);
            let (position, yaw) = Self::track_point(distance);
            if let Some(object) = scheduler.object_mut(cart) {
                object.live.position = position;
                object.live.orientation = Orientation::new(yaw, 0.0);
                object.live.velocity = Vec3::new(SPEED_PER_TICK, 0.0, 0.0);
            }
        }
        if tick % 100 == 0 {
            let lit = (tick / 100) % 2 == 1;
            for &cart in &self.carts {
                if let Some(object) = scheduler.object_mut(cart) {
                    object.metadata_mut().update(|m| m["lights"] = lit.into());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Demo observers
// ---------------------------------------------------------------------------

async fn observe(id: u64, mut rx: UnboundedReceiver<bytes::Bytes>) {
    let mut mirror = ObserverMirror::new();
    while let Some(payload) = rx.recv().await {
        let event: SyncEvent<SyncMessage> = match serde_json::from_slice(&payload) {
            Ok(e) => e,
            Err(e) => {
                log::warn!("observer {} received undecodable event: {}", id, e);
                continue;
            }
        };
        match mirror.apply(&event.payload) {
            Err(e) => log::warn!("observer {} frame {}: {}", id, event.frame, e),
            Ok(()) if mirror.applied_count() % 200 == 0 => log::info!(
                "observer {} frame {}: {} visible, {} spawns, {} despawns",
                id,
                event.frame,
                mirror.len(),
                mirror.spawn_count(),
                mirror.despawn_count()
            ),
            Ok(()) => {}
        }
    }
}

/// Walks one observer back and forth along the track through the command
/// queue, as a network session would.
async fn walk(commands: CommandSender, id: u64, tick: Duration) {
    let mut timer = tokio::time::interval(tick * 10);
    let mut x = 0.0;
    let mut step = 5.0;
    loop {
        timer.tick().await;
        x += step;
        if !(0.0..=TRACK_LENGTH).contains(&x) {
            step = -step;
        }
        commands.move_to(id, x, 0.0, 0.0);
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn load_config(args: &Args) -> Result<SyncConfig> {
    let mut builder = config::Config::builder()
        .add_source(config::Config::try_from(&SyncConfig::default())?);
    if let Some(path) = &args.config {
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    let mut cfg: SyncConfig = builder
        .add_source(config::Environment::with_prefix("SYNC"))
        .build()
        .context("Failed to assemble configuration")?
        .try_deserialize()
        .context("Invalid sync configuration")?;

    if let Some(radius) = args.radius {
        cfg.visibility_radius = radius;
    }
    if cfg.visibility_radius.is_nan() || cfg.visibility_radius < 0.0 {
        bail!("visibility radius must be non-negative, got {}", cfg.visibility_radius);
    }
    Ok(cfg)
}

/// Wall-clock time for `ticks` ticks of length `tick`.
fn run_duration(tick: Duration, ticks: u64) -> Result<Duration> {
    let ticks = u32::try_from(ticks).context("--ticks must fit in 32 bits")?;
    tick.checked_mul(ticks).context("--ticks run time overflows")
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("janet_sync=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let sync_config = load_config(&args)?;

    log::info!(
        "Starting janet-sync-server (session='{}', {} carts, radius={}, tick={}Hz)",
        args.session,
        args.carts,
        sync_config.visibility_radius,
        args.tick_rate_hz,
    );

    let mut scheduler = SyncScheduler::new(sync_config);

    // Demo train, coupled so the carts never drift apart on clients
    let carts: Vec<ObjectId> = (0..args.carts)
        .map(|i| {
            let distance = (-(i as f64) * CART_SPACING).rem_euclid(TRACK_LENGTH);
            let (position, yaw) = TrackSimulation::track_point(distance);
            scheduler.spawn_object(
                ObjectDescriptor::new(RenderKind(1), position)
                    .with_orientation(Orientation::new(yaw, 0.0))
                    .with_metadata(serde_json::json!({ "lights": false, "index": i })),
            )
        })
        .collect();
    scheduler
        .create_group(&carts)
        .context("Failed to couple demo train")?;

    let motion = TrackSimulation { carts, head: 0.0 };
    let agent_config = SyncAgentConfig {
        session: args.session.clone(),
        tick_rate_hz: args.tick_rate_hz,
    };
    let mut agent = SyncAgent::new(agent_config, scheduler, Box::new(motion));

    // Stationary observers spread along the track, plus one walker
    for i in 0..args.observers {
        let x = TRACK_LENGTH * (i as f64 + 0.5) / args.observers.max(1) as f64;
        let rx = agent.connect_observer(i, x, 0.0, 0.0);
        tokio::spawn(observe(i, rx));
    }
    let walker = args.observers;
    let rx = agent.connect_observer(walker, 0.0, 0.0, 0.0);
    tokio::spawn(observe(walker, rx));
    let tick = Duration::from_secs_f32(1.0 / args.tick_rate_hz);
    tokio::spawn(walk(agent.commands(), walker, tick));

    // Run until shutdown
    let run_for = args.ticks.map(|n| run_duration(tick, n)).transpose()?;
    let shutdown = async move {
        match run_for {
            Some(duration) => tokio::time::sleep(duration).await,
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    };
    agent.run(shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_duration_scales_tick_length() {
        let tick = Duration::from_millis(50);
        assert_eq!(run_duration(tick, 40).unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn run_duration_rejects_oversized_tick_counts() {
        let tick = Duration::from_millis(50);
        assert!(run_duration(tick, u64::from(u32::MAX) + 1).is_err());
        assert!(run_duration(Duration::MAX, 2).is_err());
    }
}
