use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use gitnote_core::models::{ConflictKind, Folder, FolderConflict, SyncHistoryEntry, Tag, TagConflict};
use gitnote_core::sync::{SyncStatus, SyncStatusInfo};
use gitnote_core::{
    ConflictDecision, ConflictSet, MemoryProvider, MemoryRemoteStore, Resolution, SyncConfig,
    SyncService,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::cli::{Cli, Commands, Side};
use crate::commands::account::run_login;
use crate::commands::auto::{format_status_lines, run_status};
use crate::commands::common::{format_timestamp, open_service_with, resolve_db_path, StorePaths};
use crate::commands::conflicts::{build_decisions, format_conflict_lines};
use crate::commands::sync::{format_history_lines, run_sync};
use crate::error::CliError;

fn sample_conflicts() -> ConflictSet {
    let folder = Folder {
        id: "f1".to_string(),
        updated_at: "2024-01-01T00:00:00.000Z".to_string(),
        ..Folder::new("Projects", "nb")
    };
    let moved = Folder {
        parent_id: Some("f0".to_string()),
        updated_at: "2024-01-02T00:00:00.000Z".to_string(),
        ..folder.clone()
    };
    let tag = Tag {
        id: "t1".to_string(),
        ..Tag::new("rust")
    };
    ConflictSet {
        folders: vec![FolderConflict {
            id: "f1".to_string(),
            local: folder,
            remote: moved,
        }],
        tags: vec![TagConflict {
            id: "t1".to_string(),
            local: tag.clone(),
            remote: Tag {
                name: "rustlang".to_string(),
                ..tag
            },
        }],
        ..ConflictSet::default()
    }
}

struct Workspace {
    _dir: TempDir,
    service: SyncService,
    remote: Arc<MemoryRemoteStore>,
}

fn workspace() -> Workspace {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths {
        db_path: dir.path().join("data").join("gitnote.db"),
        settings_path: dir.path().join("config").join("settings.json"),
    };
    let remote = Arc::new(MemoryRemoteStore::new());
    let provider = MemoryProvider::new(Arc::clone(&remote)).with_user("token", "octocat");
    let service = open_service_with(&paths, Arc::new(provider), SyncConfig::default()).unwrap();
    Workspace {
        _dir: dir,
        service,
        remote,
    }
}

#[test]
fn resolve_db_path_prefers_flag() {
    let path = resolve_db_path(Some(PathBuf::from("/tmp/notes.db"))).unwrap();
    assert_eq!(path, PathBuf::from("/tmp/notes.db"));
}

#[test]
fn cli_parses_resolve_picks() {
    let cli = Cli::try_parse_from([
        "gitnote",
        "resolve",
        "--pick",
        "folder:f1=remote",
        "--pick",
        "tag:t1=local",
    ])
    .unwrap();
    match cli.command {
        Commands::Resolve { all, pick } => {
            assert_eq!(all, None);
            assert_eq!(pick, vec!["folder:f1=remote", "tag:t1=local"]);
        }
        _ => panic!("expected resolve"),
    }
}

#[test]
fn cli_rejects_all_with_picks() {
    let parsed = Cli::try_parse_from([
        "gitnote",
        "resolve",
        "--all",
        "local",
        "--pick",
        "tag:t1=remote",
    ]);
    assert!(parsed.is_err());
}

#[test]
fn cli_accepts_global_paths_after_subcommand() {
    let cli = Cli::try_parse_from(["gitnote", "status", "--db-path", "/tmp/a.db"]).unwrap();
    assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/a.db")));
}

#[test]
fn build_decisions_applies_side_to_every_conflict() {
    let decisions = build_decisions(&sample_conflicts(), Some(Side::Remote), &[]).unwrap();
    assert_eq!(
        decisions,
        vec![
            ConflictDecision::new(ConflictKind::Folder, "f1", Resolution::Remote),
            ConflictDecision::new(ConflictKind::Tag, "t1", Resolution::Remote),
        ]
    );
}

#[test]
fn build_decisions_parses_picks() {
    let picks = vec!["folder:f1=local".to_string()];
    let decisions = build_decisions(&sample_conflicts(), None, &picks).unwrap();
    assert_eq!(
        decisions,
        vec![ConflictDecision::new(
            ConflictKind::Folder,
            "f1",
            Resolution::Local
        )]
    );
}

#[test]
fn build_decisions_requires_input() {
    assert!(matches!(
        build_decisions(&sample_conflicts(), None, &[]),
        Err(CliError::MissingDecisions)
    ));
    let picks = vec!["folder-f1".to_string()];
    assert!(matches!(
        build_decisions(&sample_conflicts(), None, &picks),
        Err(CliError::InvalidDecision(_))
    ));
}

#[test]
fn conflict_lines_show_both_sides() {
    let lines = format_conflict_lines(&sample_conflicts());
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("folder:f1"));
    assert!(lines[0].contains("parent=-"));
    assert!(lines[0].contains("parent=f0"));
    assert_eq!(lines[1], "tag:t1  local \"rust\"  remote \"rustlang\"");
}

#[test]
fn format_timestamp_renders_utc() {
    assert_eq!(
        format_timestamp("2024-05-06T07:08:09.000Z"),
        "2024-05-06 07:08:09 UTC"
    );
    assert_eq!(format_timestamp("not a time"), "not a time");
}

#[test]
fn status_lines_describe_auto_sync() {
    let status = SyncStatusInfo {
        last_sync: None,
        status: SyncStatus::Idle,
        message: String::new(),
        auto_sync_enabled: true,
        sync_interval: 5,
    };
    assert_eq!(
        format_status_lines(&status),
        vec![
            "Status: idle".to_string(),
            "Last sync: never".to_string(),
            "Auto sync: on, every 5 minute(s)".to_string(),
        ]
    );
}

#[test]
fn history_lines_include_type_and_count() {
    let entry = SyncHistoryEntry {
        id: 1,
        sync_type: "push".to_string(),
        status: "success".to_string(),
        message: "Synced 3 files to GitHub".to_string(),
        files_count: 3,
        synced_at: "2024-05-06T07:08:09.000Z".to_string(),
    };
    let lines = format_history_lines(&[entry]);
    assert_eq!(
        lines,
        vec!["2024-05-06 07:08:09 UTC  push    success files=3 Synced 3 files to GitHub"]
    );
}

#[tokio::test]
async fn sync_requires_login() {
    let workspace = workspace();
    assert!(matches!(
        run_sync(&workspace.service).await,
        Err(CliError::NotLoggedIn)
    ));
}

#[tokio::test]
async fn login_then_sync_writes_config() {
    let workspace = workspace();
    run_login(&workspace.service, "token").await.unwrap();
    run_sync(&workspace.service).await.unwrap();

    assert!(workspace
        .remote
        .file_content("config/data.json")
        .is_some());
    run_status(&workspace.service, true).unwrap();
}

#[tokio::test]
async fn bad_token_is_reported() {
    let workspace = workspace();
    assert!(matches!(
        run_login(&workspace.service, "nope").await,
        Err(CliError::Login(_))
    ));
}
