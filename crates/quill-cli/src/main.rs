mod cli;
mod commands;
mod markdown;
mod vault;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    quill_engine::init_logging();

    // Parse CLI args
    let cli = Cli::parse();

    // Handle init command early (doesn't need config)
    if let Commands::Init { path } = &cli.command {
        return commands::init::run_init(path);
    }

    // Load config
    let config = quill_engine::load_config(cli.config.as_deref())?;

    // Dispatch to command
    match cli.command {
        Commands::Init { .. } => {
            // Already handled above
            unreachable!()
        }
        Commands::Index { vault } => {
            commands::index::execute(&vault, &config).await?;
        }
        Commands::Search { query, vault, json } => {
            commands::search::execute(&query, &vault, &config, json).await?;
        }
        Commands::Ask { question, vault } => {
            commands::ask::execute(&question, &vault, &config).await?;
        }
    }

    Ok(())
}
