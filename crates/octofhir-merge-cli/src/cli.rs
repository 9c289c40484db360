use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "octofhir-merge")]
#[command(about = "Merge concurrent GraphQL queries into a single request")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "OCTOFHIR_MERGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// GraphQL endpoint URL (overrides `endpoint` from the config file)
    #[arg(short, long, global = true, env = "OCTOFHIR_MERGE_URL")]
    pub server: Option<String>,

    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the merged document and variables of the given requests
    Merge(MergeArgs),
    /// Send the given requests concurrently through the merge engine
    Send(SendArgs),
    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
pub struct MergeArgs {
    /// Request files: `.graphql` query text or `.json` request bodies
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(clap::Args)]
pub struct SendArgs {
    /// Request files: `.graphql` query text or `.json` request bodies
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Send every request on its own
    #[arg(long)]
    pub no_merge: bool,
}
