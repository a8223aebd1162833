use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Project, task and meeting tracker for small studios.
/// Data lives in ~/.spm unless --data-dir or SPM_DATA_DIR says otherwise.
#[derive(Parser)]
#[command(name = "spm", version, about = "Studio project management CLI")]
pub struct Cli {
    /// Directory holding the store, uploaded files and config.toml.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
