use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use studio_pm::cli::Cli;
use studio_pm::cmd::{self, Commands, Context};
use studio_pm::config::{self, Config, BLOB_DIR, STORE_FILE};
use studio_pm::gateway::{FsBlobStore, HttpPlanSuggester, JsonStore};
use studio_pm::workspace::{Gateways, Workspace};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Completions need no data directory
    if let Commands::Completions { shell } = cli.command {
        cmd::cmd_completions(shell);
        return;
    }

    let data_dir = match config::data_dir(cli.data_dir.clone()) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("Failed to create data directory {}: {}", data_dir.display(), e);
        std::process::exit(1);
    }

    let config = match Config::load(&data_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter)))
        .with_writer(std::io::stderr)
        .init();

    let store = Arc::new(JsonStore::open(data_dir.join(STORE_FILE)));
    let mut gateways = Gateways::local(store, FsBlobStore::new(data_dir.join(BLOB_DIR)));
    if let Some(endpoint) = &config.plan.endpoint {
        gateways = gateways.with_planner(Arc::new(HttpPlanSuggester::new(endpoint.clone(), config.plan_api_key())));
    }

    let mut ws = Workspace::new(gateways);
    if !ws.load().await {
        tracing::warn!("Some collections failed to load; continuing with what was read");
    }

    let mut ctx = Context::new(ws, config);
    cmd::run(&mut ctx, cli.command).await;
}
