//! End-to-end sync scenarios against the in-memory remote store

use std::collections::BTreeMap;
use std::sync::Arc;

use gitnote_core::codec::ConfigSnapshot;
use gitnote_core::models::{Folder, Note, Notebook};
use gitnote_core::settings::keys;
use gitnote_core::sync::paths::{note_path, CONFIG_PATH};
use gitnote_core::sync::MergeEngine;
use gitnote_core::{
    JsonSettingsStore, LocalStore, MemoryProvider, MemoryRemoteStore, SettingsStore,
    SqliteLocalStore, SyncConfig, SyncService,
};
use pretty_assertions::assert_eq;
use serde_json::Value;

struct Stores {
    local: SqliteLocalStore,
    settings: JsonSettingsStore,
    remote: MemoryRemoteStore,
}

impl Stores {
    fn new() -> Self {
        Self {
            local: SqliteLocalStore::open_in_memory().unwrap(),
            settings: JsonSettingsStore::in_memory(),
            remote: MemoryRemoteStore::new(),
        }
    }

    fn engine(&self) -> MergeEngine<'_> {
        MergeEngine::new(&self.local, &self.settings, &self.remote)
    }

    fn default_notebook(&self) -> Notebook {
        self.local.list_notebooks().unwrap().remove(0)
    }
}

fn note_with_id(id: &str, title: &str, notebook_id: &str) -> Note {
    Note {
        id: id.to_string(),
        ..Note::new(title, format!("{title} body"), Some(notebook_id.to_string()))
    }
}

#[tokio::test]
async fn fresh_store_pulls_remote_notebook_and_note() {
    let stores = Stores::new();
    let work = Notebook {
        updated_at: "2024-03-01T00:00:00.000Z".to_string(),
        created_at: "2024-03-01T00:00:00.000Z".to_string(),
        ..Notebook::new("Work")
    };
    let snapshot = ConfigSnapshot::new(
        vec![work.clone()],
        Vec::new(),
        Vec::new(),
        BTreeMap::new(),
    );
    stores
        .remote
        .insert_file(CONFIG_PATH, &snapshot.encode().unwrap());
    stores.remote.insert_file(
        "notes/Work/Plan_abcdef01.md",
        "---\nid: abcdef01-0000-4000-8000-000000000000\ntitle: \"Plan\"\nnotebook: Work\n\
         folder: \ntags: [\"q1\"]\nis_pinned: 1\nsort_order: 0\n\
         created_at: 2024-03-01T00:00:00.000Z\nupdated_at: 2024-03-02T00:00:00.000Z\n---\n\n\
         Ship it",
    );

    let outcome = stores.engine().pull().await.unwrap();

    assert_eq!(outcome.new_notes, 1);
    assert_eq!(outcome.updated_notes, 0);
    assert_eq!(stores.local.list_notebooks().unwrap().len(), 2);

    let notes = stores.local.list_live_notes().unwrap();
    assert_eq!(notes.len(), 1);
    let pulled = &notes[0];
    assert_eq!(pulled.note.id, "abcdef01-0000-4000-8000-000000000000");
    assert_eq!(pulled.note.content, "Ship it");
    assert!(pulled.note.is_pinned);
    assert_eq!(pulled.note.notebook_id.as_deref(), Some(work.id.as_str()));
    assert_eq!(pulled.tag_names(), vec!["q1".to_string()]);
}

#[tokio::test]
async fn push_deletes_only_files_without_a_live_note() {
    let stores = Stores::new();
    let notebook = stores.default_notebook();
    let live = note_with_id("11111111-0000-4000-8000-000000000000", "Alpha", &notebook.id);
    stores.local.insert_note(&live).unwrap();

    let live_path = note_path(Some(notebook.name.as_str()), "Alpha", &live.id);
    let orphan_path = "notes/Default_Notebook/Beta_22222222.md";
    stores.remote.insert_file(&live_path, "stale copy");
    stores.remote.insert_file(orphan_path, "orphan");

    let outcome = stores.engine().push().await.unwrap();

    assert_eq!(outcome.deleted, 1);
    assert_eq!(stores.remote.deletes(), 1);
    assert_eq!(stores.remote.file_content(orphan_path), None);
    let document = stores.remote.file_content(&live_path).unwrap();
    assert!(document.contains("id: 11111111-0000-4000-8000-000000000000"));
}

#[tokio::test]
async fn second_push_without_changes_writes_nothing() {
    let stores = Stores::new();
    let notebook = stores.default_notebook();
    stores
        .local
        .insert_note(&Note::new("Groceries", "milk\neggs", Some(notebook.id)))
        .unwrap();

    let first = stores.engine().push().await.unwrap();
    assert_eq!(first.synced_files, 2);
    assert_eq!(first.written, 2);
    let writes = stores.remote.writes();

    let second = stores.engine().push().await.unwrap();
    assert_eq!(second.written, 0);
    assert_eq!(second.deleted, 0);
    assert_eq!(stores.remote.writes(), writes);
}

#[tokio::test]
async fn newer_remote_notebook_wins_and_older_one_is_ignored() {
    let stores = Stores::new();
    let mut local = stores.default_notebook();
    local.updated_at = "2024-01-01T00:00:00.000Z".to_string();
    stores.local.update_notebook(&local).unwrap();
    let mut stale = Notebook::new("Archive");
    stale.updated_at = "2024-09-01T00:00:00.000Z".to_string();
    stores.local.insert_notebook(&stale).unwrap();
    stores
        .settings
        .set(keys::LAST_SYNC, Value::from("2024-06-01T00:00:00.000Z"))
        .unwrap();

    let newer = Notebook {
        name: "Renamed remotely".to_string(),
        updated_at: "2024-07-01T00:00:00.000Z".to_string(),
        ..local.clone()
    };
    let older = Notebook {
        name: "Old archive name".to_string(),
        updated_at: "2024-02-01T00:00:00.000Z".to_string(),
        ..stale.clone()
    };
    let snapshot = ConfigSnapshot::new(
        vec![newer.clone(), older],
        Vec::new(),
        Vec::new(),
        BTreeMap::new(),
    );
    stores
        .remote
        .insert_file(CONFIG_PATH, &snapshot.encode().unwrap());

    let outcome = stores.engine().pull().await.unwrap();

    assert_eq!(outcome.metadata.updated, 1);
    assert_eq!(stores.local.get_notebook(&local.id).unwrap(), Some(newer));
    assert_eq!(stores.local.get_notebook(&stale.id).unwrap(), Some(stale));
}

#[tokio::test]
async fn folder_parent_change_blocks_pull_with_one_conflict() {
    let local = Arc::new(SqliteLocalStore::open_in_memory().unwrap());
    let settings = Arc::new(JsonSettingsStore::in_memory());
    let remote = Arc::new(MemoryRemoteStore::new());
    let provider = MemoryProvider::new(Arc::clone(&remote)).with_user("token", "octocat");
    let service = SyncService::new(
        local.clone(),
        settings.clone(),
        Arc::new(provider),
        SyncConfig::default(),
    );

    let notebook = local.list_notebooks().unwrap().remove(0);
    let parent = Folder::new("Projects", notebook.id.clone());
    let child = Folder::new("Gardening", notebook.id.clone());
    local.insert_folder(&parent).unwrap();
    local.insert_folder(&child).unwrap();

    let mut moved = child.clone();
    moved.parent_id = Some(parent.id.clone());
    let snapshot = ConfigSnapshot::new(
        local.list_notebooks().unwrap(),
        vec![parent.clone(), moved],
        Vec::new(),
        BTreeMap::new(),
    );
    remote.insert_file(CONFIG_PATH, &snapshot.encode().unwrap());

    assert!(service.login("token").await.success);
    let result = service.pull_from_github().await;

    assert!(!result.success);
    let conflicts = service.get_config_conflicts();
    assert_eq!(conflicts.len(), 1);
    let ids: Vec<&str> = conflicts.folders.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec![child.id.as_str()]);
    assert_eq!(local.get_folder(&child.id).unwrap().unwrap().parent_id, None);

    // Stored conflicts keep blocking later pulls.
    let retry = service.pull_from_github().await;
    assert!(!retry.success);
    assert_eq!(service.get_config_conflicts().len(), 1);
}
