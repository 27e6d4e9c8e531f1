use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Share a stopwatch with everyone in a session")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to a JSON file with sync timing settings
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the current timer state
    Status {
        /// Session ID
        #[arg(short, long)]
        session: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start a paused timer or pause a running one
    #[command(alias = "t")]
    Toggle {
        /// Session ID
        #[arg(short, long)]
        session: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stop the timer and zero it
    Reset {
        /// Session ID
        #[arg(short, long)]
        session: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the live display time until interrupted
    Watch {
        /// Session ID
        #[arg(short, long)]
        session: String,
    },
}
