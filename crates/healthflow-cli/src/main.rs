mod cli;
mod commands;
mod completions;
mod error;
mod output;
mod records;
mod settings;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = dispatch(cli).await {
        error::handle_error(err);
    }
}

/// Logs go to stderr so stdout stays clean for replies and JSON.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "info,healthflow=debug,healthflow_spark=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Completions { shell } => {
            completions::generate_completions(shell);
            Ok(())
        }
        Commands::Chat(args) => commands::chat::run(args, config, cli.format).await,
        Commands::Analyze(args) => commands::analyze::run(args, config, cli.format).await,
        Commands::Config { command } => commands::config::run(command, config, cli.format),
    }
}
