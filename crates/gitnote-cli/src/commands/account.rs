use gitnote_core::SyncService;

use crate::cli::RepoCommands;
use crate::commands::common::require_login;
use crate::error::CliError;

pub async fn run_login(service: &SyncService, token: &str) -> Result<(), CliError> {
    let result = service.login(token).await;
    match (result.success, result.user) {
        (true, Some(user)) => {
            let (owner, repo) = service.repo().unwrap_or_default();
            println!("Logged in as {}; syncing to {owner}/{repo}", user.login);
            Ok(())
        }
        _ => Err(CliError::Login(
            result
                .error
                .unwrap_or_else(|| "unknown error".to_string()),
        )),
    }
}

pub fn run_logout(service: &SyncService) {
    if !service.is_logged_in() {
        println!("Not logged in.");
        return;
    }
    service.logout();
    println!("Logged out");
}

pub fn run_whoami(service: &SyncService) -> Result<(), CliError> {
    require_login(service)?;
    match service.get_user() {
        Some(user) => {
            let name = user.name.as_deref().unwrap_or("(no name)");
            println!("{} ({name})", user.login);
        }
        None => println!("Logged in (account details unavailable)"),
    }
    Ok(())
}

pub fn run_repo(service: &SyncService, command: Option<RepoCommands>) -> Result<(), CliError> {
    require_login(service)?;
    if let Some(RepoCommands::Set { owner, repo }) = command {
        service.set_repo(&owner, &repo)?;
    }
    match service.repo() {
        Some((owner, repo)) => println!("{owner}/{repo}"),
        None => println!("No repository configured."),
    }
    Ok(())
}
