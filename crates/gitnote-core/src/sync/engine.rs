//! Merge engine: the pull (remote to local) and push (local to remote) passes

use std::collections::{HashMap, HashSet};

use crate::codec::markdown::{self, DecodedNote, DEFAULT_NOTEBOOK_DIR};
use crate::codec::snapshot::collect_settings;
use crate::codec::ConfigSnapshot;
use crate::db::LocalStore;
use crate::error::{Error, Result};
use crate::models::{ConflictKind, Folder, Note, NoteDetails, Notebook, Tag};
use crate::remote::{fetch, list_files_recursive, RemoteEntry, RemoteStore};
use crate::settings::{keys, SettingsStore};
use crate::util::{is_newer, now_iso};

use super::conflicts::{detect_conflicts, load_conflicts, store_conflicts, ResolvedKeys};
use super::paths::{id_suffix, note_path, CONFIG_PATH, NOTES_DIR};

const CONFIG_MESSAGE: &str = "📝 Update config";

/// Entity counts from a metadata merge
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetadataOutcome {
    pub inserted: usize,
    pub updated: usize,
    /// Remote items left out because applying them would break local invariants
    pub skipped: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PullOutcome {
    pub new_notes: usize,
    pub updated_notes: usize,
    /// Note files that could not be read or applied
    pub failed_files: usize,
    pub metadata: MetadataOutcome,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    /// Every live note, plus the config file unless conflicts held it back
    pub synced_files: usize,
    /// Files whose remote content actually changed
    pub written: usize,
    pub deleted: usize,
    /// Result of the pull that ran first, when the remote already had a config
    pub pulled: Option<PullOutcome>,
    /// Unresolved config conflicts; the config file was left untouched
    pub conflicts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoteChange {
    Inserted,
    Updated,
    Unchanged,
}

/// One sync pass over a local store, its settings and a remote store
pub struct MergeEngine<'a> {
    local: &'a dyn LocalStore,
    settings: &'a dyn SettingsStore,
    remote: &'a dyn RemoteStore,
}

impl<'a> MergeEngine<'a> {
    pub fn new(
        local: &'a dyn LocalStore,
        settings: &'a dyn SettingsStore,
        remote: &'a dyn RemoteStore,
    ) -> Self {
        Self {
            local,
            settings,
            remote,
        }
    }

    /// Current local metadata as a snapshot
    pub fn local_snapshot(&self) -> Result<ConfigSnapshot> {
        Ok(ConfigSnapshot::new(
            self.local.list_notebooks()?,
            self.local.list_folders()?,
            self.local.list_tags()?,
            collect_settings(self.settings),
        ))
    }

    /// Remote snapshot, or `None` when absent or unparseable
    pub async fn fetch_remote_snapshot(&self) -> Result<Option<ConfigSnapshot>> {
        let Some(file) = fetch(self.remote, CONFIG_PATH).await? else {
            return Ok(None);
        };
        match ConfigSnapshot::decode(&file.content) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(error) => {
                tracing::warn!("Ignoring unparseable remote config: {error}");
                Ok(None)
            }
        }
    }

    /// Merge remote metadata and notes into the local store
    ///
    /// Fails with [`Error::Conflict`] before touching the local store when
    /// unresolved conflicts exist or new ones are detected; new conflicts are
    /// persisted for [`super::SyncService::get_config_conflicts`].
    pub async fn pull(&self) -> Result<PullOutcome> {
        let pending = load_conflicts(self.settings);
        if !pending.is_empty() {
            return Err(Error::Conflict(pending.len()));
        }

        let mut outcome = PullOutcome::default();
        if let Some(remote) = self.fetch_remote_snapshot().await? {
            let local = self.local_snapshot()?;
            let last_sync = self.settings.get_string(keys::LAST_SYNC);
            let conflicts = detect_conflicts(&local, &remote, last_sync.as_deref());
            if !conflicts.is_empty() {
                tracing::warn!("Pull blocked by {} config conflict(s)", conflicts.len());
                store_conflicts(self.settings, &conflicts)?;
                return Err(Error::Conflict(conflicts.len()));
            }
            outcome.metadata = self.merge_metadata(&remote, &ResolvedKeys::default())?;
        }

        self.pull_notes(&mut outcome).await?;
        tracing::info!(
            "Pulled {} new and {} updated note(s)",
            outcome.new_notes,
            outcome.updated_notes
        );
        Ok(outcome)
    }

    /// Last-write-wins merge of remote notebooks and folders; tags are insert-only
    pub fn merge_metadata(
        &self,
        remote: &ConfigSnapshot,
        resolved: &ResolvedKeys,
    ) -> Result<MetadataOutcome> {
        let mut outcome = MetadataOutcome::default();

        for notebook in &remote.notebooks {
            if resolved.contains(ConflictKind::Notebook, &notebook.id) {
                continue;
            }
            match self.local.get_notebook(&notebook.id)? {
                None => {
                    self.local.insert_notebook(notebook)?;
                    outcome.inserted += 1;
                }
                Some(existing) if is_newer(&notebook.updated_at, &existing.updated_at) => {
                    self.local.update_notebook(notebook)?;
                    outcome.updated += 1;
                }
                Some(_) => {}
            }
        }

        for folder in parents_first(&remote.folders) {
            if resolved.contains(ConflictKind::Folder, &folder.id) {
                continue;
            }
            let existing = self.local.get_folder(&folder.id)?;
            let apply = existing
                .as_ref()
                .map_or(true, |existing| is_newer(&folder.updated_at, &existing.updated_at));
            if !apply {
                continue;
            }
            if !write_folder(self.local, folder)? {
                outcome.skipped += 1;
            } else if existing.is_some() {
                outcome.updated += 1;
            } else {
                outcome.inserted += 1;
            }
        }

        for tag in &remote.tags {
            if resolved.contains(ConflictKind::Tag, &tag.id)
                || self.local.get_tag(&tag.id)?.is_some()
            {
                continue;
            }
            if write_tag(self.local, tag)? {
                outcome.inserted += 1;
            } else {
                outcome.skipped += 1;
            }
        }

        Ok(outcome)
    }

    async fn pull_notes(&self, outcome: &mut PullOutcome) -> Result<()> {
        let files = list_files_recursive(self.remote, NOTES_DIR).await?;
        for entry in files.iter().filter(|entry| entry.name.ends_with(".md")) {
            match self.pull_note(entry).await {
                Ok(NoteChange::Inserted) => outcome.new_notes += 1,
                Ok(NoteChange::Updated) => outcome.updated_notes += 1,
                Ok(NoteChange::Unchanged) => {}
                Err(error) => {
                    tracing::warn!("Failed to pull note {}: {error}", entry.path);
                    outcome.failed_files += 1;
                }
            }
        }
        Ok(())
    }

    async fn pull_note(&self, entry: &RemoteEntry) -> Result<NoteChange> {
        let file = self.remote.get(&entry.path).await?;
        let decoded = markdown::decode(&file.content, &entry.name);
        let Some(id) = decoded.id.clone() else {
            tracing::debug!("Skipping {}: no id in front matter", entry.path);
            return Ok(NoteChange::Unchanged);
        };

        match self.local.get_note(&id)? {
            None => {
                self.insert_pulled_note(id, decoded)?;
                Ok(NoteChange::Inserted)
            }
            Some(existing) => self.update_pulled_note(existing, decoded),
        }
    }

    fn insert_pulled_note(&self, id: String, decoded: DecodedNote) -> Result<()> {
        let notebook_name = decoded.notebook.as_deref().unwrap_or(DEFAULT_NOTEBOOK_DIR);
        let notebook = self.find_or_create_notebook(notebook_name)?;
        let folder_id = self.resolve_folder(&notebook.id, decoded.folder.as_deref())?;
        let now = now_iso();

        let note = Note {
            id,
            title: decoded.title,
            content: decoded.content,
            notebook_id: Some(notebook.id),
            folder_id,
            is_pinned: decoded.is_pinned,
            is_deleted: false,
            sort_order: decoded.sort_order,
            created_at: decoded.created_at.unwrap_or_else(|| now.clone()),
            updated_at: decoded.updated_at.unwrap_or(now),
        };
        self.local.insert_note(&note)?;
        self.link_tags(&note.id, &decoded.tags)
    }

    fn update_pulled_note(&self, mut note: Note, decoded: DecodedNote) -> Result<NoteChange> {
        let remote_newer = decoded
            .updated_at
            .as_deref()
            .is_some_and(|updated_at| is_newer(updated_at, &note.updated_at));
        let mut changed = false;

        if remote_newer {
            note.title = decoded.title;
            note.content = decoded.content;
            note.is_pinned = decoded.is_pinned;
            note.sort_order = decoded.sort_order;
            if let Some(updated_at) = decoded.updated_at {
                note.updated_at = updated_at;
            }
            changed = true;
        }

        // Repair notes whose folder link was lost
        if note.folder_id.is_none() {
            if let Some(notebook_id) = note.notebook_id.as_deref() {
                let folder_id = self.resolve_folder(notebook_id, decoded.folder.as_deref())?;
                if folder_id.is_some() {
                    note.folder_id = folder_id;
                    changed = true;
                }
            }
        }

        if !changed {
            return Ok(NoteChange::Unchanged);
        }
        self.local.update_note(&note)?;
        if remote_newer {
            self.link_tags(&note.id, &decoded.tags)?;
        }
        Ok(NoteChange::Updated)
    }

    fn find_or_create_notebook(&self, name: &str) -> Result<Notebook> {
        if let Some(notebook) = self.local.find_notebook_by_name(name)? {
            return Ok(notebook);
        }
        let notebook = Notebook::new(name);
        self.local.insert_notebook(&notebook)?;
        tracing::debug!("Created notebook '{name}' for pulled note");
        Ok(notebook)
    }

    fn resolve_folder(&self, notebook_id: &str, name: Option<&str>) -> Result<Option<String>> {
        let Some(name) = name.filter(|name| !name.is_empty()) else {
            return Ok(None);
        };
        Ok(self
            .local
            .find_folder(notebook_id, name)?
            .map(|folder| folder.id))
    }

    /// Point a note's tag links at the named tags, creating missing ones
    fn link_tags(&self, note_id: &str, names: &[String]) -> Result<()> {
        let mut tag_ids = Vec::with_capacity(names.len());
        for name in names {
            let tag = match self.local.find_tag_by_name(name)? {
                Some(tag) => tag,
                None => {
                    let tag = Tag::new(name.as_str());
                    self.local.insert_tag(&tag)?;
                    tag
                }
            };
            tag_ids.push(tag.id);
        }
        self.local.set_note_tags(note_id, &tag_ids)
    }

    /// Publish local state: pull first when the remote has a config, then
    /// write the config and every live note, then delete orphaned note files
    ///
    /// Config conflicts only hold back the config file. Notes are still pulled
    /// and pushed, and the count is reported in [`PushOutcome::conflicts`].
    pub async fn push(&self) -> Result<PushOutcome> {
        self.remote.ensure_container_exists().await?;

        let mut outcome = PushOutcome::default();
        if fetch(self.remote, CONFIG_PATH).await?.is_some() {
            match self.pull().await {
                Ok(pulled) => outcome.pulled = Some(pulled),
                Err(Error::Conflict(count)) => {
                    tracing::warn!("Config held back by {count} conflict(s); syncing notes only");
                    let mut pulled = PullOutcome::default();
                    self.pull_notes(&mut pulled).await?;
                    outcome.pulled = Some(pulled);
                    outcome.conflicts = count;
                }
                Err(error) => return Err(error),
            }
        }

        if outcome.conflicts == 0 && self.push_config().await? {
            outcome.written += 1;
        }
        let notes = self.local.list_live_notes()?;
        outcome.written += self.push_notes(&notes).await?;
        outcome.deleted = self.reconcile_deletions(&notes).await;
        outcome.synced_files = notes.len() + usize::from(outcome.conflicts == 0);

        tracing::info!(
            "Pushed {} file(s): {} written, {} deleted",
            outcome.synced_files,
            outcome.written,
            outcome.deleted
        );
        Ok(outcome)
    }

    /// Write the local snapshot unless the remote one already matches it
    pub async fn push_config(&self) -> Result<bool> {
        let snapshot = self.local_snapshot()?;
        let current = fetch(self.remote, CONFIG_PATH).await?;
        if let Some(file) = &current {
            let unchanged = ConfigSnapshot::decode(&file.content)
                .is_ok_and(|remote| remote.same_content(&snapshot));
            if unchanged {
                tracing::debug!("Remote config is up to date");
                return Ok(false);
            }
        }

        let content = snapshot.encode()?;
        let expected_hash = current.as_ref().map(|file| file.hash.as_str());
        self.remote
            .put(CONFIG_PATH, &content, expected_hash, CONFIG_MESSAGE)
            .await?;
        Ok(true)
    }

    /// Write each note whose document differs from the remote copy
    async fn push_notes(&self, notes: &[NoteDetails]) -> Result<usize> {
        let mut written = 0;
        for details in notes {
            let note = &details.note;
            let notebook_name = details.notebook_name.as_deref();
            let path = note_path(notebook_name, &note.title, &note.id);

            let mut tags = details.tag_names();
            tags.sort();
            let document =
                markdown::encode(note, notebook_name, details.folder_name.as_deref(), &tags);

            let current = fetch(self.remote, &path).await?;
            if current.as_ref().is_some_and(|file| file.content == document) {
                continue;
            }
            let expected_hash = current.as_ref().map(|file| file.hash.as_str());
            let message = format!("📝 Sync: {}", note.title);
            self.remote
                .put(&path, &document, expected_hash, &message)
                .await?;
            written += 1;
        }
        Ok(written)
    }

    /// Delete remote note files whose id prefix matches no live note
    ///
    /// Files without an id suffix are left alone. Failures are logged per file.
    async fn reconcile_deletions(&self, notes: &[NoteDetails]) -> usize {
        warn_on_prefix_collisions(notes);
        let live: HashSet<&str> = notes.iter().map(|details| details.note.id_prefix()).collect();

        let files = match list_files_recursive(self.remote, NOTES_DIR).await {
            Ok(files) => files,
            Err(error) => {
                tracing::warn!("Skipping deletion pass: {error}");
                return 0;
            }
        };

        let mut deleted = 0;
        for file in files {
            let Some(prefix) = id_suffix(&file.name) else {
                continue;
            };
            if live.contains(prefix) {
                continue;
            }
            let message = format!("🗑️ Delete: {}", file.name);
            match self.remote.delete(&file.path, &file.hash, &message).await {
                Ok(()) => deleted += 1,
                Err(error) => tracing::warn!("Failed to delete {}: {error}", file.path),
            }
        }
        deleted
    }
}

/// Insert or overwrite a folder from remote data
///
/// Returns `false` without writing when the owning notebook is missing or
/// when re-parenting an existing folder would form a cycle. A new folder whose
/// parent is missing is inserted at the top level.
pub(super) fn write_folder(local: &dyn LocalStore, folder: &Folder) -> Result<bool> {
    if local.get_notebook(&folder.notebook_id)?.is_none() {
        tracing::warn!(
            "Skipping folder {}: notebook {} does not exist locally",
            folder.id,
            folder.notebook_id
        );
        return Ok(false);
    }

    let existing = local.get_folder(&folder.id)?;
    let parent_exists = match folder.parent_id.as_deref() {
        Some(parent_id) => local.get_folder(parent_id)?.is_some(),
        None => true,
    };

    match existing {
        Some(_) => {
            if !parent_exists {
                tracing::warn!("Skipping folder {}: parent does not exist locally", folder.id);
                return Ok(false);
            }
            if would_create_cycle(local, &folder.id, folder.parent_id.as_deref())? {
                tracing::warn!("Skipping folder {}: new parent would form a cycle", folder.id);
                return Ok(false);
            }
            local.update_folder(folder)?;
        }
        None if parent_exists => local.insert_folder(folder)?,
        None => {
            tracing::warn!(
                "Folder {} references a missing parent; inserting at top level",
                folder.id
            );
            let mut detached = folder.clone();
            detached.parent_id = None;
            local.insert_folder(&detached)?;
        }
    }
    Ok(true)
}

/// Insert or rename a tag from remote data; `false` when the name is taken
pub(super) fn write_tag(local: &dyn LocalStore, tag: &Tag) -> Result<bool> {
    if let Some(existing) = local.find_tag_by_name(&tag.name)? {
        if existing.id != tag.id {
            tracing::warn!(
                "Skipping tag {}: name '{}' belongs to tag {}",
                tag.id,
                tag.name,
                existing.id
            );
            return Ok(false);
        }
    }
    if local.get_tag(&tag.id)?.is_some() {
        local.update_tag(tag)?;
    } else {
        local.insert_tag(tag)?;
    }
    Ok(true)
}

fn would_create_cycle(
    local: &dyn LocalStore,
    folder_id: &str,
    parent_id: Option<&str>,
) -> Result<bool> {
    let mut seen = HashSet::new();
    let mut current = parent_id.map(str::to_string);
    while let Some(id) = current {
        if id == folder_id || !seen.insert(id.clone()) {
            return Ok(true);
        }
        current = local.get_folder(&id)?.and_then(|folder| folder.parent_id);
    }
    Ok(false)
}

/// Order folders so each parent present in the list precedes its children
fn parents_first<'a>(folders: &'a [Folder]) -> Vec<&'a Folder> {
    let ids: HashSet<&str> = folders.iter().map(|folder| folder.id.as_str()).collect();
    let mut placed: HashSet<&str> = HashSet::with_capacity(folders.len());
    let mut ordered = Vec::with_capacity(folders.len());
    let mut remaining: Vec<&Folder> = folders.iter().collect();

    while !remaining.is_empty() {
        let before = remaining.len();
        remaining.retain(|folder| {
            let folder = *folder;
            let ready = match folder.parent_id.as_deref() {
                Some(parent) if ids.contains(parent) => placed.contains(parent),
                _ => true,
            };
            if ready {
                placed.insert(folder.id.as_str());
                ordered.push(folder);
            }
            !ready
        });
        if remaining.len() == before {
            // Parent links among the rest form a cycle
            ordered.append(&mut remaining);
        }
    }
    ordered
}

fn warn_on_prefix_collisions(notes: &[NoteDetails]) {
    let mut by_prefix: HashMap<&str, &str> = HashMap::new();
    for details in notes {
        let note = &details.note;
        if let Some(other) = by_prefix.insert(note.id_prefix(), note.id.as_str()) {
            if other != note.id {
                tracing::warn!(
                    "Notes {other} and {} share the file id prefix {}",
                    note.id,
                    note.id_prefix()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteLocalStore;
    use crate::remote::MemoryRemoteStore;
    use crate::settings::JsonSettingsStore;
    use pretty_assertions::assert_eq;

    struct Fixture {
        local: SqliteLocalStore,
        settings: JsonSettingsStore,
        remote: MemoryRemoteStore,
    }

    impl Fixture {
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

    fn note_document(id: &str, title: &str, folder: &str, tags: &str, updated_at: &str) -> String {
        format!(
            "---\nid: {id}\ntitle: \"{title}\"\nnotebook: Default Notebook\nfolder: {folder}\n\
             tags: [{tags}]\nis_pinned: 0\nsort_order: 0\ncreated_at: 2024-01-01T00:00:00.000Z\n\
             updated_at: {updated_at}\n---\n\nbody of {title}"
        )
    }

    #[test]
    fn parents_first_orders_children_after_parents() {
        let notebook_id = "nb";
        let grandchild = Folder {
            id: "c".to_string(),
            ..Folder::new("c", notebook_id).with_parent("b")
        };
        let child = Folder {
            id: "b".to_string(),
            ..Folder::new("b", notebook_id).with_parent("a")
        };
        let root = Folder {
            id: "a".to_string(),
            ..Folder::new("a", notebook_id)
        };
        let folders = vec![grandchild, child, root];
        let order: Vec<&str> = parents_first(&folders)
            .into_iter()
            .map(|folder| folder.id.as_str())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn parents_first_keeps_cyclic_folders() {
        let first = Folder {
            id: "x".to_string(),
            ..Folder::new("x", "nb").with_parent("y")
        };
        let second = Folder {
            id: "y".to_string(),
            ..Folder::new("y", "nb").with_parent("x")
        };
        let folders = vec![first, second];
        assert_eq!(parents_first(&folders).len(), 2);
    }

    #[test]
    fn write_folder_rejects_cycles() {
        let fixture = Fixture::new();
        let notebook = fixture.default_notebook();
        let parent = Folder::new("Parent", notebook.id.clone());
        let child = Folder::new("Child", notebook.id.clone()).with_parent(parent.id.clone());
        fixture.local.insert_folder(&parent).unwrap();
        fixture.local.insert_folder(&child).unwrap();

        let cyclic = parent.clone().with_parent(child.id.clone());
        assert!(!write_folder(&fixture.local, &cyclic).unwrap());
        assert_eq!(
            fixture.local.get_folder(&parent.id).unwrap().unwrap().parent_id,
            None
        );
    }

    #[test]
    fn write_folder_detaches_orphans_and_skips_unknown_notebooks() {
        let fixture = Fixture::new();
        let notebook = fixture.default_notebook();

        let orphan = Folder::new("Orphan", notebook.id.clone()).with_parent("missing");
        assert!(write_folder(&fixture.local, &orphan).unwrap());
        assert_eq!(
            fixture.local.get_folder(&orphan.id).unwrap().unwrap().parent_id,
            None
        );

        let homeless = Folder::new("Homeless", "no-such-notebook");
        assert!(!write_folder(&fixture.local, &homeless).unwrap());
        assert!(fixture.local.get_folder(&homeless.id).unwrap().is_none());
    }

    #[test]
    fn write_tag_refuses_taken_names() {
        let fixture = Fixture::new();
        fixture.local.insert_tag(&Tag::new("rust")).unwrap();
        let incoming = Tag::new("rust");
        assert!(!write_tag(&fixture.local, &incoming).unwrap());
        assert!(fixture.local.get_tag(&incoming.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn pull_links_tags_and_skips_files_without_id() {
        let fixture = Fixture::new();
        fixture.remote.insert_file(
            "notes/Default_Notebook/Tagged_aaaaaaaa.md",
            &note_document(
                "aaaaaaaa-0000-4000-8000-000000000000",
                "Tagged",
                "",
                "\"rust\", \"sync\"",
                "2024-01-02T00:00:00.000Z",
            ),
        );
        fixture
            .remote
            .insert_file("notes/Default_Notebook/loose.md", "no front matter");

        let outcome = fixture.engine().pull().await.unwrap();
        assert_eq!(outcome.new_notes, 1);
        assert_eq!(outcome.updated_notes, 0);

        let live = fixture.local.list_live_notes().unwrap();
        assert_eq!(live.len(), 1);
        let mut tags = live[0].tag_names();
        tags.sort();
        assert_eq!(tags, vec!["rust", "sync"]);
        assert_eq!(
            live[0].notebook_name.as_deref(),
            Some(fixture.default_notebook().name.as_str())
        );
    }

    #[tokio::test]
    async fn pull_repairs_missing_folder_link() {
        let fixture = Fixture::new();
        let notebook = fixture.default_notebook();
        let folder = Folder::new("Projects", notebook.id.clone());
        fixture.local.insert_folder(&folder).unwrap();

        let mut note = Note::new("Plan", "body of Plan", Some(notebook.id.clone()));
        note.id = "bbbbbbbb-0000-4000-8000-000000000000".to_string();
        note.updated_at = "2024-06-01T00:00:00.000Z".to_string();
        fixture.local.insert_note(&note).unwrap();

        // Remote copy is older but names the folder
        fixture.remote.insert_file(
            "notes/Default_Notebook/Plan_bbbbbbbb.md",
            &note_document(&note.id, "Plan", "Projects", "", "2024-01-01T00:00:00.000Z"),
        );

        let outcome = fixture.engine().pull().await.unwrap();
        assert_eq!(outcome.updated_notes, 1);

        let stored = fixture.local.get_note(&note.id).unwrap().unwrap();
        assert_eq!(stored.folder_id, Some(folder.id));
        assert_eq!(stored.updated_at, note.updated_at);
    }

    #[tokio::test]
    async fn pull_keeps_local_notes_missing_from_remote() {
        let fixture = Fixture::new();
        let notebook = fixture.default_notebook();
        let local_only = Note::new("Local only", "draft", Some(notebook.id.clone()));
        fixture.local.insert_note(&local_only).unwrap();
        fixture.remote.insert_file(
            "notes/Default_Notebook/Other_eeeeeeee.md",
            &note_document(
                "eeeeeeee-0000-4000-8000-000000000000",
                "Other",
                "",
                "",
                "2024-01-02T00:00:00.000Z",
            ),
        );

        let outcome = fixture.engine().pull().await.unwrap();
        assert_eq!(outcome.new_notes, 1);

        let stored = fixture.local.get_note(&local_only.id).unwrap().unwrap();
        assert!(!stored.is_deleted);
        assert_eq!(stored.content, "draft");
        assert_eq!(fixture.local.list_live_notes().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn pull_continues_past_unreadable_files() {
        let fixture = Fixture::new();
        fixture.remote.insert_file(
            "notes/default/Broken_cccccccc.md",
            &note_document(
                "cccccccc-0000-4000-8000-000000000000",
                "Broken",
                "",
                "",
                "2024-01-02T00:00:00.000Z",
            ),
        );
        fixture.remote.insert_file(
            "notes/default/Fine_dddddddd.md",
            &note_document(
                "dddddddd-0000-4000-8000-000000000000",
                "Fine",
                "",
                "",
                "2024-01-02T00:00:00.000Z",
            ),
        );
        fixture.remote.fail_reads_for("notes/default/Broken_cccccccc.md");

        let outcome = fixture.engine().pull().await.unwrap();
        assert_eq!(outcome.new_notes, 1);
        assert_eq!(outcome.failed_files, 1);
    }

    #[tokio::test]
    async fn pull_refuses_while_conflicts_are_pending() {
        let fixture = Fixture::new();
        let notebook = fixture.default_notebook();
        let mut remote_notebook = notebook.clone();
        remote_notebook.name = "Renamed elsewhere".to_string();
        remote_notebook.updated_at = "2099-01-01T00:00:00.000Z".to_string();
        let snapshot = ConfigSnapshot::new(vec![remote_notebook], vec![], vec![], Default::default());
        fixture
            .remote
            .insert_file(CONFIG_PATH, &snapshot.encode().unwrap());

        let engine = fixture.engine();
        assert!(matches!(engine.pull().await, Err(Error::Conflict(1))));
        assert_eq!(load_conflicts(&fixture.settings).notebooks.len(), 1);

        // Stored conflicts keep blocking even if the remote is gone
        fixture.remote.insert_file(CONFIG_PATH, "{}");
        assert!(matches!(engine.pull().await, Err(Error::Conflict(1))));
        assert_eq!(
            fixture.local.get_notebook(&notebook.id).unwrap().unwrap().name,
            notebook.name
        );
    }

    #[tokio::test]
    async fn unparseable_remote_config_counts_as_absent() {
        let fixture = Fixture::new();
        fixture.remote.insert_file(CONFIG_PATH, "{ not json");
        assert!(fixture.engine().fetch_remote_snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn push_writes_sorted_tags_and_skips_identical_config() {
        let fixture = Fixture::new();
        let notebook = fixture.default_notebook();
        let note = Note::new("Tagged", "body", Some(notebook.id.clone()));
        fixture.local.insert_note(&note).unwrap();
        let zeta = Tag::new("zeta");
        let alpha = Tag::new("alpha");
        fixture.local.insert_tag(&zeta).unwrap();
        fixture.local.insert_tag(&alpha).unwrap();
        fixture
            .local
            .set_note_tags(&note.id, &[zeta.id.clone(), alpha.id.clone()])
            .unwrap();

        let engine = fixture.engine();
        let outcome = engine.push().await.unwrap();
        assert_eq!(outcome.synced_files, 2);
        assert_eq!(outcome.written, 2);

        let path = note_path(Some(notebook.name.as_str()), &note.title, &note.id);
        let document = fixture.remote.file_content(&path).unwrap();
        assert!(document.contains("tags: [\"alpha\", \"zeta\"]"));

        assert!(!engine.push_config().await.unwrap());
    }
}
