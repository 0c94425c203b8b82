use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "gmailfilter")]
#[command(author, version, about = "Filter, clean up and cache a Gmail account")]
pub struct Cli {
    /// Config directory holding credentials.json, config.json and token_files/
    #[arg(short = 'c', long, global = true, value_name = "DIR")]
    pub config_dir: Option<String>,

    /// Cache database (connection string or path), overriding the task file
    #[arg(short = 'd', long, global = true, value_name = "DATABASE")]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the tasks of a task file (default: config.json in the config directory)
    Run {
        /// Task file to run
        file: Option<PathBuf>,
    },

    /// Print the id and display name of every label
    Labels,

    /// Copy messages missing from the local cache
    Update {
        /// Also refresh the labels of cached messages
        #[arg(long)]
        refresh_labels: bool,

        /// Drop cached messages deleted remotely
        #[arg(long)]
        prune: bool,
    },

    /// Print the ids of messages matching a Gmail search query
    Search {
        query: String,

        /// Restrict to messages carrying this label (repeatable)
        #[arg(short, long = "label", value_name = "LABEL")]
        labels: Vec<String>,
    },

    /// Forget the cached OAuth token
    Logout,
}

impl Cli {
    /// Subcommand to run, `run` with the default task file when none is given
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run { file: None })
    }
}
