//! gmailfilter - Gmail label automation from the command line
//!
//! Runs task files against a Gmail account, prints labels and search
//! results, and keeps a local SQLite cache of message metadata.

use anyhow::{Context, Result};
use clap::Parser;
use config::Paths;
use log::{error, info};
use std::path::Path;
use std::sync::Arc;

use mail::{
    DriveClient, GmailAuth, GmailClient, GmailCredentials, InMemoryMailStore, MailApi, MailStore,
    Orchestrator, SyncOptions, TaskFile, open_database, run_tasks,
};

mod cli;

use cli::{Cli, Command};

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let paths = match &cli.config_dir {
        Some(dir) => Paths::new(dir),
        None => Paths::default_location()?,
    };
    paths.init()?;

    let credentials = GmailCredentials::load(&paths)?;
    let auth = Arc::new(GmailAuth::new(credentials, paths.token_file()));
    let api: Arc<dyn MailApi> = Arc::new(GmailClient::new(auth.clone()));

    match cli.command() {
        Command::Run { file } => {
            let file = file.unwrap_or_else(|| paths.tasks_file());
            let tasks = TaskFile::load(&file)?;
            let store = open_store(&cli, &paths, tasks.database.as_deref())?;
            let drive = Arc::new(DriveClient::new(auth));
            let orchestrator = Orchestrator::new(api, store, Some(drive))?;

            info!("Running {} tasks from {}", tasks.tasks.len(), file.display());
            for report in run_tasks(&orchestrator, &tasks.tasks)? {
                println!("{}", report);
            }
        }
        Command::Labels => {
            let orchestrator = Orchestrator::new(api, Arc::new(InMemoryMailStore::new()), None)?;
            for label in orchestrator.labels().iter() {
                println!("{}\t{}", label.id.as_str(), label.name);
            }
        }
        Command::Update {
            refresh_labels,
            prune,
        } => {
            // The default task file may name the cache
            let database = default_task_database(&paths.tasks_file())?;
            let store = open_store(&cli, &paths, database.as_deref())?;
            let orchestrator = Orchestrator::new(api, store, None)?;

            let stats = orchestrator.update_database(SyncOptions {
                refresh_labels,
                prune_missing: prune,
            })?;
            println!(
                "{} listed, {} new messages stored, {} vanished, {} errors, {} pruned",
                stats.listed, stats.stored, stats.vanished, stats.errors, stats.pruned
            );
        }
        Command::Search { query, labels } => {
            let orchestrator = Orchestrator::new(api, Arc::new(InMemoryMailStore::new()), None)?;
            for message in orchestrator.search_messages(&query, &labels)? {
                println!("{}", message?.id);
            }
        }
        Command::Logout => {
            auth.logout()?;
            info!("Removed cached token {}", paths.token_file().display());
        }
    }

    Ok(())
}

/// Open the cache: command line first, then the task file, then the default
fn open_store(cli: &Cli, paths: &Paths, from_tasks: Option<&str>) -> Result<Arc<dyn MailStore>> {
    let default = paths.default_database().to_string_lossy().into_owned();
    let conn = cli
        .database
        .as_deref()
        .or(from_tasks)
        .unwrap_or(default.as_str());
    info!("Using cache database {}", conn);
    open_database(conn).with_context(|| format!("Failed to open cache database {}", conn))
}

fn default_task_database(tasks_file: &Path) -> Result<Option<String>> {
    if !tasks_file.exists() {
        return Ok(None);
    }
    Ok(TaskFile::load(tasks_file)?.database)
}
