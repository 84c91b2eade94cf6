use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Quill - hybrid search over your markdown vault", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new config file
    Init {
        /// Path for new config file
        #[arg(default_value = "quill.toml")]
        path: PathBuf,
    },
    /// Index a vault and report stats
    Index {
        /// Vault directory (tilde-expanded)
        #[arg(long, default_value = ".")]
        vault: String,
    },
    /// Keyword search over a vault
    Search {
        /// Query, including filter syntax ("phrase" #tag ext: path: -path: -word)
        query: String,
        /// Vault directory (tilde-expanded)
        #[arg(long, default_value = ".")]
        vault: String,
        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Ask a question, answered from vault content
    Ask {
        /// The question
        question: String,
        /// Vault directory (tilde-expanded)
        #[arg(long, default_value = ".")]
        vault: String,
    },
}
