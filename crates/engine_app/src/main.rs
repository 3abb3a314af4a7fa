//! # engine_app
//!
//! Demo host for the live-pluggable ECS engine. It installs the demo modes,
//! spawns a handful of entities through events, and runs the tick loop on a
//! tokio interval until the tick budget is spent or Ctrl-C is pressed.
//!
//! Logging is configured through `RUST_LOG`; `engine_app=info` is always on.

mod modes;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use engine_core::{Engine, EngineConfig, SYSTEM_FAILED};
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use modes::{Jitter, Movement, POSITION, SPAWN, Spawner};

#[derive(Parser)]
#[command(name = "engine_app", about = "Runs a small ECS simulation with pluggable modes")]
struct Args {
    /// Number of ticks to run (0 runs until interrupted)
    #[arg(short, long, default_value_t = 120)]
    ticks: u64,

    /// Target ticks per second (0 runs ticks back to back)
    #[arg(short = 'r', long, default_value_t = 60.0)]
    tick_rate: f64,

    /// Entities to spawn before the loop starts
    #[arg(short, long, default_value_t = 8)]
    entities: usize,

    /// Seed for the jitter mode
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// JSON file with engine settings; command line values win
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<EngineConfig>(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    let tick_rate = (args.tick_rate > 0.0).then_some(args.tick_rate);
    Ok(config.with_tick_rate(tick_rate).with_max_ticks(args.ticks))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("engine_app=info".parse()?)
                .add_directive("engine_core=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let dt = config.tick_rate.map_or(1.0 / 60.0, |rate| 1.0 / rate);

    let mut engine = Engine::with_config(config);
    info!(engine = %engine.instance_id(), "engine host starting");

    engine.use_mode(Movement::new(dt))?;
    engine.use_mode(Jitter::new(args.seed))?;
    engine.use_mode(Spawner)?;
    engine.on(SYSTEM_FAILED, |_ctx, payload| {
        error!(failure = %payload, "system failure reported");
        Ok(())
    });

    for i in 0..args.entities {
        let jitter = (i % 3) as f64 * 0.1;
        engine.emit(SPAWN, json!({"vx": 1.0 + i as f64, "vy": 0.5, "jitter": jitter}));
    }
    info!(
        entities = engine.entity_count(),
        systems = ?engine.system_names(),
        components = ?engine.component_names(),
        "world populated"
    );

    let stop = engine.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping at next tick boundary");
            stop.stop();
        }
    });

    let ticks = engine.start_async().await?;

    for failure in engine.take_failures() {
        warn!(
            system = %failure.system,
            tick_id = failure.tick_id,
            entity = ?failure.entity,
            error = %failure.message,
            "system was disabled after a failure"
        );
    }
    for entity in engine.entities() {
        if let Some(position) = engine.get_component(entity, POSITION) {
            info!(entity = %entity, position = %position.to_json(), "final position");
        }
    }
    info!(ticks, "engine host shut down");
    Ok(())
}
