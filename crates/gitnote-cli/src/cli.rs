use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use gitnote_core::Resolution;

#[derive(Parser)]
#[command(name = "gitnote")]
#[command(about = "Mirror your notes into a GitHub repository")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the settings JSON file
    #[arg(long, global = true, value_name = "PATH")]
    pub settings_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a GitHub personal access token and store it
    Login {
        /// GitHub personal access token with `repo` scope
        #[arg(long, value_name = "TOKEN")]
        token: String,
    },
    /// Forget the stored token and stop auto sync
    Logout,
    /// Show the signed-in GitHub account
    Whoami,
    /// Show or change the sync repository
    Repo {
        #[command(subcommand)]
        command: Option<RepoCommands>,
    },
    /// Push local notes and metadata to GitHub, pulling first
    Sync,
    /// Pull notes and metadata from GitHub without pushing
    Pull,
    /// List configuration conflicts blocking a pull
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve configuration conflicts
    Resolve {
        /// Use this side for every conflict
        #[arg(long, value_enum, value_name = "SIDE", conflicts_with = "pick")]
        all: Option<Side>,
        /// Decide one item, e.g. `folder:<id>=remote` (repeatable)
        #[arg(long, value_name = "KIND:KEY=SIDE")]
        pick: Vec<String>,
    },
    /// Show sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recent sync passes
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure automatic sync
    Auto {
        #[command(subcommand)]
        command: AutoCommands,
    },
    /// Run automatic sync in the foreground until Ctrl-C
    Watch,
}

#[derive(Subcommand)]
pub enum RepoCommands {
    /// Sync into OWNER/REPO instead of the default repository
    Set {
        /// Repository owner (user or organization)
        owner: String,
        /// Repository name
        repo: String,
    },
}

#[derive(Subcommand)]
pub enum AutoCommands {
    /// Enable automatic sync
    Start,
    /// Disable automatic sync
    Stop,
    /// Set the automatic sync interval
    Interval {
        /// Minutes between syncs
        minutes: u64,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Side {
    Local,
    Remote,
}

impl From<Side> for Resolution {
    fn from(side: Side) -> Self {
        match side {
            Side::Local => Self::Local,
            Side::Remote => Self::Remote,
        }
    }
}
