//! island-bridge-sim binary
//!
//! Runs the bridge headless against a loopback chain: every submission is
//! echoed back as a confirmed model update after a configurable latency.
//! Useful for watching the batching/settling behaviour without a chain.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Key                  | Default  | Description                          |
//! |----------------------|----------|--------------------------------------|
//! | `BRIDGE_PLAYER`      | `0x1`    | Local player address                 |
//! | `BRIDGE_CONFIG`      | (none)   | Optional TOML config file            |
//! | `BRIDGE_LATENCY_MS`  | `250`    | Simulated confirmation latency       |
//!
//! Every `BridgeConfig` field can also be set via `BRIDGE_*` env vars or the
//! TOML file (e.g. `BRIDGE_MAX_BATCH_SIZE=5`, `batch_wait_ms = 200`).

use anyhow::Result;
use clap::Parser;
use island_bridge::protocol::PlayerDataModel;
use island_bridge::{
    BlockPos, Bridge, BridgeConfig, ChainSubmitter, Felt, ModelUpdate, NullRenderer,
    TokioScheduler,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "island-bridge-sim", about = "Island bridge loopback simulator", version)]
struct Args {
    /// Local player address
    #[arg(long, env = "BRIDGE_PLAYER", default_value = "0x1")]
    player: String,

    /// Optional TOML config file with BridgeConfig fields
    #[arg(long, env = "BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Simulated confirmation latency in milliseconds
    #[arg(long, env = "BRIDGE_LATENCY_MS", default_value_t = 250)]
    latency_ms: u64,
}

fn load_config(args: &Args) -> Result<BridgeConfig> {
    let mut builder =
        config::Config::builder().add_source(config::Config::try_from(&BridgeConfig::default())?);
    if let Some(path) = &args.config {
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    let mut cfg: BridgeConfig = builder
        .add_source(config::Environment::with_prefix("BRIDGE"))
        .build()?
        .try_deserialize()?;
    cfg.player = args.player.clone();
    Ok(cfg)
}

// ---------------------------------------------------------------------------
// Loopback chain
// ---------------------------------------------------------------------------

/// Logs submitted words and forwards their count to the confirmation loop.
struct LoopbackChain {
    submissions: mpsc::UnboundedSender<usize>,
}

impl ChainSubmitter for LoopbackChain {
    fn submit(&self, words: &[Felt]) {
        for word in words {
            log::info!("chain call arg: {}", word);
        }
        let _ = self.submissions.send(words.len());
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("island_bridge=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let latency = Duration::from_millis(args.latency_ms);

    tracing::info!(
        "starting island-bridge-sim (player='{}', latency={}ms, batch_wait={}ms)",
        config.player,
        args.latency_ms,
        config.batch_wait_ms,
    );

    let (submissions, mut submission_rx) = mpsc::unbounded_channel();
    let chain = Arc::new(LoopbackChain { submissions });
    let (bridge, mut events) = Bridge::new(
        config.clone(),
        Arc::new(NullRenderer::default()),
        chain,
        Arc::new(TokioScheduler),
    );
    let bridge = Arc::new(parking_lot::Mutex::new(bridge));

    // Confirmation loop: one PlayerData record per submission, after the
    // simulated latency.
    let confirm_bridge = bridge.clone();
    let player = config.player.clone();
    tokio::spawn(async move {
        let mut coins = 0u32;
        while let Some(word_count) = submission_rx.recv().await {
            tokio::time::sleep(latency).await;
            coins += word_count as u32;
            confirm_bridge
                .lock()
                .on_model_update(ModelUpdate::PlayerData(PlayerDataModel {
                    player: player.clone(),
                    coins,
                    current_space_owner: player.clone(),
                    current_space_id: 1,
                }));
        }
    });

    // Surface bridge events in the log.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log::info!("bridge event: {:?}", event);
        }
    });

    // Periodic sweep for optimistic timeouts.
    let sweep_bridge = bridge.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            sweep_bridge.lock().sweep();
        }
    });

    // Demo traffic: a burst of placements, one inventory move, a craft.
    {
        let mut b = bridge.lock();
        b.request_select_hotbar(2);
        for i in 0..5 {
            b.request_place_use(BlockPos::new(8192 + i, 8192, 0));
        }
        b.request_move_item(0, 0, 0, 9);
        b.request_craft(33);
        b.flush();
    }

    tracing::info!("running; ctrl-c to exit");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}
