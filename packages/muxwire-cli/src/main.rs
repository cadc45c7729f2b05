mod attach;
mod decode;
mod options;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `MUXWIRE_LOG=debug`
const LOG_ENV: &str = "MUXWIRE_LOG";

#[derive(Parser)]
#[command(
    name = "muxwire",
    about = "Muxwire CLI: decode tmux control mode streams into JSON events"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode control mode lines read from stdin
    Decode(decode::DecodeArgs),

    /// Attach to a tmux session in control mode and print its events
    Attach(attach::AttachArgs),
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Decode(args) => decode::run(args).await,
        Commands::Attach(args) => attach::run(args).await,
    }
}
