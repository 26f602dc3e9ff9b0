//! Round lifecycle engine binary.
//!
//! Wires the engine core together with its runtime collaborators and runs
//! the perpetual round cycle until interrupted: an in-memory repository, a
//! seedable random outcome selector, an always-eligible oracle, and a
//! broadcast-channel snapshot sink whose stream is mirrored into the log.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `rondo-config.yaml` (or `RONDO_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the repository, selector, oracle, and snapshot sink
//! 4. Recover or create the active round and spawn the engine task
//! 5. Follow the snapshot stream in a logging task
//! 6. Shut down cleanly on ctrl-c

mod error;
mod sink;

use std::path::Path;

use rondo_core::{GameConfig, LoggingConfig, MemoryRepository, OpenOracle, RandomSelector};
use rondo_types::GameSnapshot;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::RuntimeError;
use crate::sink::ChannelSink;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration loading, engine startup, or the
/// final shutdown join fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration before logging so the log format is configurable.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);

    info!("rondo-engine starting");
    if !from_file {
        info!("config file not found, using defaults");
    }
    info!(
        voting_window_secs = config.round.voting_window_secs,
        reveal_window_secs = config.round.reveal_window_secs,
        heartbeat_secs = config.round.heartbeat_secs,
        default_prize = %config.round.default_prize,
        tick_interval_ms = config.engine.tick_interval_ms,
        seed = config.engine.seed,
        "configuration loaded"
    );

    // 3. Build the runtime collaborators.
    let repo = MemoryRepository::new();
    let selector = RandomSelector::new(config.engine.seed);
    let oracle = OpenOracle;
    let (snapshot_sink, snapshot_rx) = ChannelSink::new(config.engine.snapshot_channel_capacity);

    // 4. Recover or create the active round, then start the engine task.
    let (handle, task) = rondo_core::spawn(config, repo, selector, snapshot_sink, oracle)
        .await
        .map_err(RuntimeError::from)?;
    info!("engine task running");

    // 5. Mirror the snapshot stream into the log.
    let logger = tokio::spawn(log_snapshots(snapshot_rx));

    // 6. Run until interrupted.
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    handle.shutdown().await;
    task.await.map_err(|err| RuntimeError::Join {
        message: err.to_string(),
    })?;
    logger.abort();

    info!("rondo-engine shutdown complete");
    Ok(())
}

/// Load the game configuration from `rondo-config.yaml`, or the path in
/// `RONDO_CONFIG`. A missing file falls back to defaults; a present but
/// invalid file is an error.
///
/// Returns the config and whether it came from a file.
fn load_config() -> Result<(GameConfig, bool), RuntimeError> {
    let path = std::env::var("RONDO_CONFIG").unwrap_or_else(|_err| "rondo-config.yaml".to_owned());
    let path = Path::new(&path);
    if path.exists() {
        Ok((GameConfig::from_file(path)?, true))
    } else {
        Ok((GameConfig::default(), false))
    }
}

/// Initialize tracing with `RUST_LOG` taking precedence over the
/// configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_err| EnvFilter::new(logging.level.clone()));
    if logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Follow the snapshot stream and log one line per snapshot.
async fn log_snapshots(mut rx: broadcast::Receiver<GameSnapshot>) {
    loop {
        match rx.recv().await {
            Ok(snapshot) => {
                debug!(
                    round = snapshot.round.number,
                    phase = %snapshot.round.phase,
                    remaining_secs = snapshot.round.remaining_secs,
                    tally_red = snapshot.round.tally.red,
                    tally_black = snapshot.round.tally.black,
                    voters = snapshot.round.voter_count,
                    rounds_completed = snapshot.game.total_rounds_completed,
                    "snapshot"
                );
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "snapshot logger lagged behind the stream");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
