//! Workspace-side repository: raw file storage plus sidecar bookkeeping of
//! which projects and files changed since they were taken from the source of
//! truth.

use std::path::{Path, PathBuf};

use lw_domain::{ChangesetType, Features, FileData, FileItem};
use tracing::debug;

use crate::sidecar::{SidecarStore, HISTORY_FOLDER, PROPERTIES_FOLDER};
use crate::store::{ChangeListener, FileSystemRepository, Repository};
use crate::Result;

mod file_props;
mod project_state;

pub use project_state::{CachedFileData, ProjectState};

/// Repository id used when a project is not bound to any remote repository.
pub const LOCAL_ID: &str = "local";

#[derive(Debug)]
pub struct LocalRepository {
    id: String,
    name: Option<String>,
    store: FileSystemRepository,
    sidecar: SidecarStore,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            id: LOCAL_ID.to_string(),
            name: None,
            store: FileSystemRepository::new(root.clone()).with_skipped_dirs(&[PROPERTIES_FOLDER]),
            sidecar: SidecarStore::new(root),
        }
    }

    #[must_use]
    pub fn with_identity(mut self, id: impl Into<String>, name: Option<String>) -> Self {
        self.id = id.into();
        self.name = name;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn root(&self) -> &Path {
        self.store.root()
    }

    pub fn initialize(&self) -> Result<()> {
        self.store.initialize()
    }

    pub fn close(&self) {
        self.store.close();
    }

    pub fn set_listener(&self, listener: Option<ChangeListener>) {
        self.store.set_listener(listener);
    }

    /// True for the properties folder; traversal never descends into it.
    pub fn is_sidecar(&self, path: &Path) -> bool {
        self.store.is_skip(path)
    }

    pub fn project_state<'a>(&'a self, path: &'a str) -> ProjectState<'a> {
        ProjectState::new(self, path)
    }

    /// Records unique-id, size and modification time reported by the source
    /// of truth for a file that was just synchronized.
    pub fn update_file_properties(&self, data: &FileData) {
        file_props::update(&self.sidecar, data);
    }

    pub fn delete_all_file_properties(&self, path: &str) {
        file_props::delete_all(&self.sidecar, path);
    }

    pub(crate) fn sidecar(&self) -> &SidecarStore {
        &self.sidecar
    }

    pub(crate) fn store(&self) -> &FileSystemRepository {
        &self.store
    }

    /// Only paths inside a project folder carry state; a plain file at the
    /// root has nowhere to keep a marker.
    fn notify_modified(&self, path: &str) -> Result<()> {
        if !self.sidecar.project_folder(path).is_dir() {
            debug!(path, "not inside a project, nothing to mark");
            return Ok(());
        }
        debug!(path, "marking modified");
        self.project_state(path).notify_modified()
    }

    /// Cached unique-id survives only while the file still matches its
    /// metadata record.
    fn overlay(&self, mut data: FileData) -> FileData {
        let properties = file_props::read(&self.sidecar, &data.name);
        if let Some(unique_id) = properties.get(file_props::UNIQUE_ID) {
            data.unique_id = if file_props::is_modified(&data, &properties) {
                None
            } else {
                Some(unique_id.to_string())
            };
        }
        data
    }
}

fn is_hidden(name: &str) -> bool {
    name.split('/')
        .any(|segment| segment == PROPERTIES_FOLDER || segment == HISTORY_FOLDER)
}

impl Repository for LocalRepository {
    fn list(&self, path: &str) -> Result<Vec<FileData>> {
        Ok(self
            .store
            .list(path)?
            .into_iter()
            .filter(|data| !is_hidden(&data.name))
            .map(|data| self.overlay(data))
            .collect())
    }

    fn list_folders(&self, path: &str) -> Result<Vec<FileData>> {
        Ok(self
            .store
            .list_folders(path)?
            .into_iter()
            .filter(|data| !is_hidden(&data.name))
            .collect())
    }

    fn check(&self, name: &str) -> Result<Option<FileData>> {
        Ok(self.store.check(name)?.map(|data| self.overlay(data)))
    }

    fn read(&self, name: &str) -> Result<Option<(FileData, Vec<u8>)>> {
        Ok(self
            .store
            .read(name)?
            .map(|(data, content)| (self.overlay(data), content)))
    }

    fn save(&self, data: &FileData, content: &[u8]) -> Result<FileData> {
        let saved = self.store.save(data, content)?;
        self.notify_modified(&data.name)?;
        Ok(saved)
    }

    fn save_batch(&self, items: &[FileItem]) -> Result<Vec<FileData>> {
        let saved = self.store.save_batch(items)?;
        for data in &saved {
            self.notify_modified(&data.name)?;
        }
        Ok(saved)
    }

    fn save_folder(
        &self,
        folder: &FileData,
        items: &[FileItem],
        changeset: ChangesetType,
    ) -> Result<FileData> {
        let saved = self.store.save_folder(folder, items, changeset)?;
        self.notify_modified(&folder.name)?;
        Ok(saved)
    }

    fn delete(&self, data: &FileData) -> Result<bool> {
        let deleted = self.store.delete(data)?;
        // A bare project name means the whole project is gone, marker included.
        let notified = if deleted && data.name.trim_matches('/').contains('/') {
            self.notify_modified(&data.name)
        } else {
            Ok(())
        };
        file_props::delete(&self.sidecar, &data.name);
        notified.map(|()| deleted)
    }

    fn features(&self) -> Features {
        Features {
            versions: false,
            mapped_folders: false,
            unique_file_id: true,
            folders: true,
        }
    }
}
