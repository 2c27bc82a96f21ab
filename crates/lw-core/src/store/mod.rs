use std::sync::Arc;

use lw_domain::{ChangesetType, Features, FileData, FileItem};

use crate::Result;

mod fs;

pub use fs::FileSystemRepository;

/// Callback fired after a repository changed its content.
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

/// Raw content store. All names are `/`-separated and root-relative.
pub trait Repository: Send + Sync {
    /// Every file below `path`, sorted by name.
    fn list(&self, path: &str) -> Result<Vec<FileData>>;
    /// Direct child folders of `path`, sorted by name.
    fn list_folders(&self, path: &str) -> Result<Vec<FileData>>;
    fn check(&self, name: &str) -> Result<Option<FileData>>;
    fn read(&self, name: &str) -> Result<Option<(FileData, Vec<u8>)>>;
    fn save(&self, data: &FileData, content: &[u8]) -> Result<FileData>;
    fn save_batch(&self, items: &[FileItem]) -> Result<Vec<FileData>>;
    fn save_folder(
        &self,
        folder: &FileData,
        items: &[FileItem],
        changeset: ChangesetType,
    ) -> Result<FileData>;
    /// Returns `false` when there was nothing to delete.
    fn delete(&self, data: &FileData) -> Result<bool>;
    fn features(&self) -> Features;
}
