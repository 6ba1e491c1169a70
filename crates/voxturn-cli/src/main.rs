//! CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use voxturn_cli::{Cli, Commands, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Serve(args) => handlers::serve::execute(args).await?,
        Commands::Talk(args) => handlers::talk::execute(args).await?,
    }
    Ok(())
}
