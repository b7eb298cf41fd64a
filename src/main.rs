// Sealbox — Application Entry Point
//
// Parses CLI arguments, initializes structured logging (with a filter that
// never emits secret material), and dispatches to the command handler.
// Uses the tokio async runtime for the UDS gateway.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sealbox::cli::{execute, Cli};

#[tokio::main]
async fn main() {
    // RUST_LOG=sealbox=debug for verbose output. The default level is
    // `info`, which never includes plaintext or digest bytes.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sealbox=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
