use crate::runtime;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gammu-gateway-demo",
    version,
    about = "Demo driver for the gammu gateway core library"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway and poll until Ctrl+C.
    Run {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Display version information.
    Version,
}

/// Entry function for CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => runtime::runtime::run_gateway(config).await?,
        Commands::Version => show_version(),
    }

    Ok(())
}

fn show_version() {
    println!("gammu-gateway-demo {}", env!("CARGO_PKG_VERSION"));
}
