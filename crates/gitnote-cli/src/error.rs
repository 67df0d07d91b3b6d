use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] gitnote_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Login failed: {0}")]
    Login(String),
    #[error("Not logged in. Run `gitnote login --token <TOKEN>` first.")]
    NotLoggedIn,
    #[error("{0}")]
    SyncFailed(String),
    #[error("Invalid decision: {0}")]
    InvalidDecision(String),
    #[error("Pass --all local|remote or at least one --pick kind:key=local|remote")]
    MissingDecisions,
}

impl From<gitnote_core::remote::RemoteError> for CliError {
    fn from(error: gitnote_core::remote::RemoteError) -> Self {
        Self::Core(error.into())
    }
}
