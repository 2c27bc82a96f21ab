//! Location of the property records stored beside project content.
//!
//! Every project folder directly under the workspace root owns one
//! properties folder. Records are addressed by a data path (any path inside
//! the project) plus a record name relative to that folder.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{IoContext, Result};

pub const PROPERTIES_FOLDER: &str = ".lwprops";
pub const HISTORY_FOLDER: &str = ".lwhistory";

#[derive(Clone, Debug)]
pub struct SidecarStore {
    root: PathBuf,
}

impl SidecarStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Top-level folder under the root that contains `data_path`.
    pub fn project_folder(&self, data_path: &str) -> PathBuf {
        let project = data_path
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default();
        self.root.join(project)
    }

    pub fn properties_folder(&self, data_path: &str) -> PathBuf {
        self.project_folder(data_path).join(PROPERTIES_FOLDER)
    }

    /// Record location; the record itself may or may not exist.
    pub fn get(&self, data_path: &str, name: &str) -> PathBuf {
        name.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.properties_folder(data_path), |acc, segment| {
                acc.join(segment)
            })
    }

    /// Ensures the record exists, creating parent folders as needed. Existing
    /// content is left untouched.
    pub fn create(&self, data_path: &str, name: &str) -> Result<PathBuf> {
        let path = self.get(data_path, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).io_context("creating", parent)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(path),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(path),
            Err(err) => Err(err).io_context("creating", &path),
        }
    }

    pub fn delete(&self, data_path: &str, name: &str) -> Result<()> {
        let path = self.get(data_path, name);
        match fs::remove_file(&path) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err).io_context("removing", &path),
            _ => Ok(()),
        }
    }

    /// Root-relative, `/`-separated form of `absolute`, or `None` when it
    /// lies outside the root.
    pub fn relative_path(&self, absolute: &Path) -> Option<String> {
        let relative = absolute.strip_prefix(&self.root).ok()?;
        let segments: Vec<_> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn records_resolve_under_the_owning_project() {
        let store = SidecarStore::new("/ws");
        assert_eq!(store.project_folder("Loans/rules/main.xlsx"), Path::new("/ws/Loans"));
        assert_eq!(
            store.get("Loans/rules/main.xlsx", ".version"),
            Path::new("/ws/Loans/.lwprops/.version")
        );
        assert_eq!(
            store.get("Loans", "file-properties/rules/main.xlsx"),
            Path::new("/ws/Loans/.lwprops/file-properties/rules/main.xlsx")
        );
        assert_ne!(
            store.get("Loans", ".version"),
            store.get("Loans", "file-properties/.version")
        );
    }

    #[test]
    fn create_is_idempotent_and_keeps_content() {
        let dir = tempdir().unwrap();
        let store = SidecarStore::new(dir.path());
        let path = store.create("Loans", ".version").unwrap();
        assert!(path.is_file());
        fs::write(&path, "version=3\n").unwrap();

        let again = store.create("Loans", ".version").unwrap();
        assert_eq!(again, path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "version=3\n");
    }

    #[test]
    fn delete_of_missing_record_is_noop() {
        let dir = tempdir().unwrap();
        let store = SidecarStore::new(dir.path());
        store.delete("Loans", ".modified").unwrap();

        store.create("Loans", ".modified").unwrap();
        store.delete("Loans", ".modified").unwrap();
        assert!(!store.get("Loans", ".modified").exists());
    }

    #[test]
    fn relative_path_uses_forward_slashes() {
        let dir = tempdir().unwrap();
        let store = SidecarStore::new(dir.path());
        let absolute = dir.path().join("Loans").join("rules").join("main.xlsx");
        assert_eq!(
            store.relative_path(&absolute).as_deref(),
            Some("Loans/rules/main.xlsx")
        );
        assert_eq!(store.relative_path(Path::new("/elsewhere/x")), None);
    }
}
