mod cli;
mod commands;
mod config;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    let level = cli.log_level.as_deref().unwrap_or(&cfg.logging.level);
    observability::init_tracing(level);

    match &cli.command {
        Commands::Merge(args) => {
            commands::merge::run(&cfg, args)?;
        }
        Commands::Send(args) => {
            let endpoint = config::resolve_endpoint(cli.server.as_deref(), &cfg)?;
            commands::send::run(&cfg, &endpoint, args).await?;
        }
        Commands::Config => {
            commands::config::show(&cfg)?;
        }
    }

    Ok(())
}
