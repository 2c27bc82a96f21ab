use time::OffsetDateTime;

/// Author of a revision as reported by the source of truth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
}

impl UserInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Translation between a local project folder and the path the design-time
/// repository knows it by.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMapping {
    pub external_path: String,
    pub internal_path: String,
}

impl FileMapping {
    pub fn new(external_path: impl Into<String>, internal_path: impl Into<String>) -> Self {
        Self {
            external_path: external_path.into(),
            internal_path: internal_path.into(),
        }
    }
}

/// Descriptor of a file or folder in a repository.
///
/// `name` is always a `/`-separated path relative to the repository root.
/// Everything besides `name` and `size` is optional because different stores
/// know different things about their content.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileData {
    pub name: String,
    pub size: u64,
    pub modified_at: Option<OffsetDateTime>,
    pub author: Option<UserInfo>,
    pub version: Option<String>,
    pub branch: Option<String>,
    pub comment: Option<String>,
    pub unique_id: Option<String>,
    pub deleted: bool,
    pub mapping: Option<FileMapping>,
}

impl FileData {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn author_name(&self) -> Option<&str> {
        self.author.as_ref().map(|author| author.name.as_str())
    }

    /// Last path segment of `name`.
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// A file to write together with its content. `None` content inside a diff
/// changeset means the file must be removed.
#[derive(Clone, Debug)]
pub struct FileItem {
    pub data: FileData,
    pub content: Option<Vec<u8>>,
}

impl FileItem {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            data: FileData::named(name),
            content: Some(content.into()),
        }
    }

    pub fn removal(name: impl Into<String>) -> Self {
        Self {
            data: FileData::named(name),
            content: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangesetType {
    /// The item set is the complete new content of the folder.
    Full,
    /// The item set only lists changed and removed files.
    Diff,
}

/// Capability flags a repository advertises to its callers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Features {
    pub versions: bool,
    pub mapped_folders: bool,
    pub unique_file_id: bool,
    pub folders: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(FileData::named("Loans/rules/main.xlsx").file_name(), "main.xlsx");
        assert_eq!(FileData::named("Loans").file_name(), "Loans");
    }

    #[test]
    fn author_name_reads_through_user_info() {
        let mut data = FileData::named("Loans");
        assert_eq!(data.author_name(), None);
        data.author = Some(UserInfo::new("jdoe"));
        assert_eq!(data.author_name(), Some("jdoe"));
    }
}
