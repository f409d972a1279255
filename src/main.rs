// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use anyhow::Context as _;
use clap::Parser;
use coolq_bridge::{app::App, config::Configs};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "coolq-bridge", about = "Forwards private chat events to the command exchange")]
struct Cli {
    /// TOML config file. Missing files fall back to the defaults.
    #[arg(long, env = "COOLQ_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Attach a correlation id and reply queue to every command and log the replies.
    #[arg(long, default_value_t = false)]
    rpc: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli);

    let mut cfg = Configs::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.rpc {
        cfg.bridge.rpc = true;
    }

    let app = App::setup(&cfg).await.context("setting up the bridge")?;

    tokio::select! {
        res = app.run() => {
            res.context("consumer stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("shutdown requested");
            app.shutdown().await;
        }
    }

    info!("bye");
    Ok(())
}
