use std::path::Path;

use lw_domain::{
    format_legacy_date, from_millis, parse_legacy_date, to_millis, FileData, FileMapping,
    PropertyMap, UserInfo,
};
use time::OffsetDateTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::file_props::{self, FILE_PROPERTIES_FOLDER, MODIFIED_FLAG, SIZE};
use super::LocalRepository;
use crate::error::{IoContext, LocalStateError, Result};

const MODIFIED_MARKER: &str = ".modified";
const VERSION_RECORD: &str = ".version";

const REPOSITORY_ID: &str = "repository-id";
const PATH_IN_REPOSITORY: &str = "path-in-repository";
const VERSION: &str = "version";
const BRANCH: &str = "branch";
const AUTHOR: &str = "author";
/// Date-only form kept for readers of old records.
const MODIFIED_AT: &str = "modified-at";
const MODIFIED_AT_LONG: &str = "modified-at-long";
const COMMENT: &str = "comment";

/// Outcome of reading the cached revision of a project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CachedFileData {
    /// No version record at all.
    Missing,
    /// A record exists but lacks version, author or modification time; the
    /// source of truth must be asked instead.
    Partial,
    Complete(FileData),
}

impl CachedFileData {
    pub fn into_complete(self) -> Option<FileData> {
        match self {
            Self::Complete(data) => Some(data),
            Self::Missing | Self::Partial => None,
        }
    }
}

/// Sidecar view of one project, bound to a path inside it. Holds no state of
/// its own; every call goes to disk.
#[derive(Clone, Copy, Debug)]
pub struct ProjectState<'a> {
    repository: &'a LocalRepository,
    path: &'a str,
}

impl<'a> ProjectState<'a> {
    pub(crate) fn new(repository: &'a LocalRepository, path: &'a str) -> Self {
        Self { repository, path }
    }

    pub fn path(&self) -> &str {
        self.path
    }

    pub fn notify_modified(&self) -> Result<()> {
        self.repository.sidecar().create(self.path, MODIFIED_MARKER)?;
        file_props::set_modified(self.repository.sidecar(), self.path);
        self.repository.store().invoke_listener();
        Ok(())
    }

    pub fn is_modified(&self) -> bool {
        self.repository
            .sidecar()
            .get(self.path, MODIFIED_MARKER)
            .exists()
    }

    pub fn clear_modify_status(&self) -> Result<()> {
        let sidecar = self.repository.sidecar();
        sidecar.delete(self.path, MODIFIED_MARKER)?;
        let folder = sidecar
            .properties_folder(self.path)
            .join(FILE_PROPERTIES_FOLDER);
        if !folder.is_dir() {
            return Ok(());
        }
        for entry in WalkDir::new(&folder) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(path = %folder.display(), %err, "skipping unreadable metadata entry");
                    continue;
                }
            };
            if entry.file_type().is_file() {
                clear_file_flag(entry.path());
            }
        }
        Ok(())
    }

    /// `None` forgets the version so that it is asked from the source of truth.
    pub fn set_version(&self, version: Option<&str>) -> Result<()> {
        let sidecar = self.repository.sidecar();
        let Some(version) = version else {
            return sidecar.delete(self.path, VERSION_RECORD);
        };
        let location = sidecar.create(self.path, VERSION_RECORD)?;
        let properties: PropertyMap = [(VERSION, version)].into_iter().collect();
        properties.store(&location).io_context("writing", &location)
    }

    pub fn version(&self) -> Result<Option<String>> {
        self.property(VERSION)
    }

    pub fn repository_id(&self) -> Result<Option<String>> {
        self.property(REPOSITORY_ID)
    }

    /// Persists the revision the project was taken from. Incomplete data is
    /// ignored: a partial cache would be trusted later as if it were whole.
    pub fn save_file_data(&self, repository_id: &str, data: &FileData) -> Result<()> {
        let (Some(version), Some(author), Some(modified_at)) =
            (&data.version, data.author_name(), data.modified_at)
        else {
            debug!(path = self.path, "incomplete revision data, not cached");
            return Ok(());
        };

        let mut properties = PropertyMap::new();
        properties.insert(REPOSITORY_ID, repository_id);
        if let Some(mapping) = &data.mapping {
            properties.insert(PATH_IN_REPOSITORY, mapping.internal_path.as_str());
        }
        properties.insert(VERSION, version.as_str());
        properties.insert(AUTHOR, author);
        properties.insert(MODIFIED_AT, format_legacy_date(modified_at));
        properties.insert(MODIFIED_AT_LONG, to_millis(modified_at).to_string());
        properties.insert(SIZE, data.size.to_string());
        if let Some(comment) = &data.comment {
            properties.insert(COMMENT, comment.as_str());
        }
        if let Some(branch) = &data.branch {
            properties.insert(BRANCH, branch.as_str());
        }

        let location = self.repository.sidecar().create(self.path, VERSION_RECORD)?;
        properties.store(&location).io_context("writing", &location)
    }

    /// Rebuilds the cached revision. Unlike the modification check, a record
    /// that cannot be parsed is an error here, never a guess.
    pub fn file_data(&self) -> Result<CachedFileData> {
        let sidecar = self.repository.sidecar();
        let location = sidecar.get(self.path, VERSION_RECORD);
        if !location.exists() {
            return Ok(CachedFileData::Missing);
        }
        let properties = load(&location)?;

        let modified_at = match properties.get(MODIFIED_AT_LONG) {
            Some(raw) => Some(parse_millis(&location, raw)?),
            None => properties
                .get(MODIFIED_AT)
                .map(|raw| {
                    parse_legacy_date(raw)
                        .map_err(|err| LocalStateError::corrupt(&location, err))
                })
                .transpose()?,
        };
        let (Some(version), Some(author), Some(modified_at)) =
            (properties.get(VERSION), properties.get(AUTHOR), modified_at)
        else {
            return Ok(CachedFileData::Partial);
        };
        let size = properties
            .get(SIZE)
            .ok_or_else(|| LocalStateError::corrupt(&location, "missing size"))?
            .trim()
            .parse::<u64>()
            .map_err(|err| LocalStateError::corrupt(&location, err))?;

        let name = sidecar
            .project_folder(self.path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mapping = properties
            .get(PATH_IN_REPOSITORY)
            .map(|internal| FileMapping::new(name.as_str(), internal));

        Ok(CachedFileData::Complete(FileData {
            name,
            size,
            modified_at: Some(modified_at),
            author: Some(UserInfo::new(author)),
            version: Some(version.to_string()),
            branch: properties.get(BRANCH).map(ToString::to_string),
            comment: properties.get(COMMENT).map(ToString::to_string),
            mapping,
            ..FileData::default()
        }))
    }

    fn property(&self, key: &str) -> Result<Option<String>> {
        let location = self.repository.sidecar().get(self.path, VERSION_RECORD);
        if !location.exists() {
            return Ok(None);
        }
        Ok(load(&location)?.get(key).map(ToString::to_string))
    }
}

fn load(location: &Path) -> Result<PropertyMap> {
    PropertyMap::load(location).map_err(|err| match err.kind() {
        std::io::ErrorKind::InvalidData => LocalStateError::corrupt(location, err),
        _ => LocalStateError::io(format!("reading {}", location.display()), err),
    })
}

fn parse_millis(location: &Path, raw: &str) -> Result<OffsetDateTime> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(from_millis)
        .ok_or_else(|| LocalStateError::corrupt(location, format!("bad timestamp '{raw}'")))
}

fn clear_file_flag(location: &Path) {
    let mut properties = match PropertyMap::load(location) {
        Ok(properties) => properties,
        Err(err) => {
            warn!(path = %location.display(), %err, "skipping unreadable metadata record");
            return;
        }
    };
    if properties.remove(MODIFIED_FLAG).is_none() {
        return;
    }
    if let Err(err) = properties.store(location) {
        warn!(path = %location.display(), %err, "cannot rewrite metadata record");
    }
}
