mod commands;

pub use commands::*;

use clap::Parser;

#[derive(Parser)]
#[command(name = "dapflow")]
#[command(about = "Inspect dapflow configuration and launch resolution", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to $DAPFLOW_CONFIG, then the system config directory)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}
