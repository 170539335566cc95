//! avatar-voice CLI binary entry point.

use avatar_voice::cli::realtime::handle_realtime;
use avatar_voice::cli::speak::handle_speak;
use avatar_voice::cli::{Cli, Commands};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Realtime(args) => handle_realtime(args).await,
        Commands::Speak(args) => handle_speak(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
