use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use lw_domain::{truncate_to_millis, ChangesetType, Features, FileData, FileItem};
use time::OffsetDateTime;
use tracing::debug;
use walkdir::WalkDir;

use super::{ChangeListener, Repository};
use crate::error::{IoContext, Result};

/// Repository backed by a plain directory tree.
pub struct FileSystemRepository {
    root: PathBuf,
    skipped_dirs: Vec<String>,
    listener: RwLock<Option<ChangeListener>>,
}

impl fmt::Debug for FileSystemRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystemRepository")
            .field("root", &self.root)
            .field("skipped_dirs", &self.skipped_dirs)
            .finish_non_exhaustive()
    }
}

impl FileSystemRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            skipped_dirs: Vec::new(),
            listener: RwLock::new(None),
        }
    }

    /// Directories with these names are never traversed.
    #[must_use]
    pub fn with_skipped_dirs(mut self, names: &[&str]) -> Self {
        self.skipped_dirs = names.iter().map(ToString::to_string).collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root).io_context("creating", &self.root)
    }

    pub fn close(&self) {
        self.set_listener(None);
    }

    pub fn set_listener(&self, listener: Option<ChangeListener>) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = listener;
    }

    pub(crate) fn invoke_listener(&self) {
        let listener = self
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener();
        }
    }

    pub fn is_skip(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.skipped_dirs.iter().any(|skipped| skipped == name))
    }

    pub(crate) fn resolve(&self, name: &str) -> PathBuf {
        name.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    /// Describes an existing file or folder.
    pub fn file_data(&self, path: &Path) -> Result<FileData> {
        let metadata = fs::metadata(path).io_context("reading metadata of", path)?;
        let modified = metadata.modified().io_context("reading mtime of", path)?;
        let name = path
            .strip_prefix(&self.root)
            .map(|relative| {
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_else(|_| path.to_string_lossy().into_owned());
        Ok(FileData {
            name,
            size: if metadata.is_file() { metadata.len() } else { 0 },
            modified_at: Some(truncate_to_millis(OffsetDateTime::from(modified))),
            ..FileData::default()
        })
    }

    fn walk_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !(entry.file_type().is_dir() && self.is_skip(entry.path())));
        for entry in walker {
            let entry = entry.map_err(io::Error::from).io_context("listing", dir)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn write_file(&self, data: &FileData, content: &[u8]) -> Result<PathBuf> {
        let path = self.resolve(&data.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).io_context("creating", parent)?;
        }
        fs::write(&path, content).io_context("writing", &path)?;
        if let Some(modified_at) = data.modified_at {
            File::options()
                .write(true)
                .open(&path)
                .and_then(|file| file.set_modified(SystemTime::from(modified_at)))
                .io_context("setting mtime of", &path)?;
        }
        debug!(path = %path.display(), bytes = content.len(), "saved file");
        Ok(path)
    }

    fn remove_path(path: &Path) -> Result<bool> {
        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match result {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).io_context("removing", path),
        }
    }
}

impl Repository for FileSystemRepository {
    fn list(&self, path: &str) -> Result<Vec<FileData>> {
        let mut listed = self
            .walk_files(&self.resolve(path))?
            .iter()
            .map(|file| self.file_data(file))
            .collect::<Result<Vec<_>>>()?;
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }

    fn list_folders(&self, path: &str) -> Result<Vec<FileData>> {
        let dir = self.resolve(path);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut folders = Vec::new();
        for entry in fs::read_dir(&dir).io_context("listing", &dir)? {
            let entry = entry.io_context("listing", &dir)?;
            let child = entry.path();
            if child.is_dir() && !self.is_skip(&child) {
                folders.push(self.file_data(&child)?);
            }
        }
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    fn check(&self, name: &str) -> Result<Option<FileData>> {
        let path = self.resolve(name);
        if path.exists() {
            self.file_data(&path).map(Some)
        } else {
            Ok(None)
        }
    }

    fn read(&self, name: &str) -> Result<Option<(FileData, Vec<u8>)>> {
        let path = self.resolve(name);
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read(&path).io_context("reading", &path)?;
        Ok(Some((self.file_data(&path)?, content)))
    }

    fn save(&self, data: &FileData, content: &[u8]) -> Result<FileData> {
        let path = self.write_file(data, content)?;
        self.invoke_listener();
        self.file_data(&path)
    }

    fn save_batch(&self, items: &[FileItem]) -> Result<Vec<FileData>> {
        let mut saved = Vec::with_capacity(items.len());
        for item in items {
            match &item.content {
                Some(content) => {
                    let path = self.write_file(&item.data, content)?;
                    saved.push(self.file_data(&path)?);
                }
                None => {
                    Self::remove_path(&self.resolve(&item.data.name))?;
                }
            }
        }
        self.invoke_listener();
        Ok(saved)
    }

    fn save_folder(
        &self,
        folder: &FileData,
        items: &[FileItem],
        changeset: ChangesetType,
    ) -> Result<FileData> {
        let folder_path = self.resolve(&folder.name);
        if changeset == ChangesetType::Full {
            let keep: HashSet<PathBuf> = items
                .iter()
                .filter(|item| item.content.is_some())
                .map(|item| self.resolve(&item.data.name))
                .collect();
            for existing in self.walk_files(&folder_path)? {
                if !keep.contains(&existing) {
                    Self::remove_path(&existing)?;
                }
            }
        }
        for item in items {
            match &item.content {
                Some(content) => {
                    self.write_file(&item.data, content)?;
                }
                None => {
                    Self::remove_path(&self.resolve(&item.data.name))?;
                }
            }
        }
        fs::create_dir_all(&folder_path).io_context("creating", &folder_path)?;
        self.invoke_listener();
        self.file_data(&folder_path)
    }

    fn delete(&self, data: &FileData) -> Result<bool> {
        let deleted = Self::remove_path(&self.resolve(&data.name))?;
        if deleted {
            self.invoke_listener();
        }
        Ok(deleted)
    }

    fn features(&self) -> Features {
        Features {
            folders: true,
            ..Features::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;
    use time::macros::datetime;

    fn repo(root: &Path) -> FileSystemRepository {
        let repo = FileSystemRepository::new(root).with_skipped_dirs(&[".hidden"]);
        repo.initialize().unwrap();
        repo
    }

    #[test]
    fn list_is_recursive_sorted_and_skips_hidden_dirs() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        repo.save(&FileData::named("Loans/b.xlsx"), b"bb").unwrap();
        repo.save(&FileData::named("Loans/a/c.xlsx"), b"c").unwrap();
        repo.save(&FileData::named("Loans/.hidden/x"), b"x").unwrap();

        let names: Vec<_> = repo
            .list("Loans")
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["Loans/a/c.xlsx", "Loans/b.xlsx"]);
        assert!(repo.list("Missing").unwrap().is_empty());
    }

    #[test]
    fn save_applies_requested_mtime() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        let at = datetime!(2023-06-01 12:00:00.250 UTC);
        let data = FileData {
            modified_at: Some(at),
            ..FileData::named("Loans/main.xlsx")
        };
        let saved = repo.save(&data, b"hello").unwrap();
        assert_eq!(saved.size, 5);
        assert_eq!(saved.modified_at, Some(at));
    }

    #[test]
    fn full_changeset_replaces_folder_content() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        repo.save(&FileData::named("Loans/old.xlsx"), b"old").unwrap();
        repo.save(&FileData::named("Loans/keep.xlsx"), b"keep").unwrap();

        let items = [
            FileItem::new("Loans/keep.xlsx", "kept"),
            FileItem::new("Loans/new.xlsx", "new"),
        ];
        repo.save_folder(&FileData::named("Loans"), &items, ChangesetType::Full)
            .unwrap();

        let names: Vec<_> = repo
            .list("Loans")
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["Loans/keep.xlsx", "Loans/new.xlsx"]);
    }

    #[test]
    fn diff_changeset_removes_items_without_content() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        repo.save(&FileData::named("Loans/a.xlsx"), b"a").unwrap();
        repo.save(&FileData::named("Loans/b.xlsx"), b"b").unwrap();

        let items = [FileItem::removal("Loans/a.xlsx")];
        repo.save_folder(&FileData::named("Loans"), &items, ChangesetType::Diff)
            .unwrap();
        assert!(repo.check("Loans/a.xlsx").unwrap().is_none());
        assert!(repo.check("Loans/b.xlsx").unwrap().is_some());
    }

    #[test]
    fn listener_fires_on_changes_until_closed() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        repo.set_listener(Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        repo.save(&FileData::named("Loans/a.xlsx"), b"a").unwrap();
        assert!(repo.delete(&FileData::named("Loans/a.xlsx")).unwrap());
        assert!(!repo.delete(&FileData::named("Loans/a.xlsx")).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        repo.close();
        repo.save(&FileData::named("Loans/b.xlsx"), b"b").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn read_returns_content_and_metadata() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        repo.save(&FileData::named("Loans/a.txt"), b"abc").unwrap();
        let (data, content) = repo.read("Loans/a.txt").unwrap().unwrap();
        assert_eq!(data.name, "Loans/a.txt");
        assert_eq!(content, b"abc");
        assert!(repo.read("Loans/none.txt").unwrap().is_none());
    }
}
