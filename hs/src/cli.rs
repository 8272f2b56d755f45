//! CLI argument parsing for historystore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hs")]
#[command(author, version, about = "Browse and prune Question Plus history", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the history directory
    #[arg(short = 'd', long)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List records, newest first
    List {
        /// Maximum records to show
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Search question and prompt text
    Search {
        /// Case-insensitive substring
        #[arg(required = true)]
        query: String,
    },

    /// Print one record in full
    Show {
        /// Record ID
        #[arg(required = true)]
        id: String,

        /// Print only the optimized prompt
        #[arg(short, long)]
        prompt_only: bool,
    },

    /// Delete a record
    Delete {
        /// Record ID
        #[arg(required = true)]
        id: String,
    },
}
