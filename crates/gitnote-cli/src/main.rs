//! gitnote CLI - keep local notes mirrored in a GitHub repository

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::account::{run_login, run_logout, run_repo, run_whoami};
use crate::commands::auto::{run_auto, run_status, run_watch};
use crate::commands::common::{open_service, StorePaths};
use crate::commands::conflicts::{run_conflicts, run_resolve};
use crate::commands::sync::{run_history, run_pull, run_sync};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gitnote=info,gitnote_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = StorePaths::resolve(cli.db_path, cli.settings_path)?;
    let service = open_service(&paths)?;

    let result = match cli.command {
        Commands::Login { token } => run_login(&service, &token).await,
        Commands::Logout => {
            run_logout(&service);
            Ok(())
        }
        Commands::Whoami => run_whoami(&service),
        Commands::Repo { command } => run_repo(&service, command),
        Commands::Sync => run_sync(&service).await,
        Commands::Pull => run_pull(&service).await,
        Commands::Conflicts { json } => run_conflicts(&service, json),
        Commands::Resolve { all, pick } => run_resolve(&service, all, &pick).await,
        Commands::Status { json } => run_status(&service, json),
        Commands::History { limit, json } => run_history(&service, limit, json),
        Commands::Auto { command } => run_auto(&service, command),
        Commands::Watch => run_watch(&service).await,
    };

    service.shutdown();
    result
}
