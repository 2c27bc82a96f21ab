use std::sync::Arc;

use lw_domain::FileData;

use crate::local::LocalRepository;

/// What the workspace knows about where a project came from.
#[derive(Clone, Debug)]
pub enum ProjectOrigin {
    /// Only a version (if any) is cached; details must come from the remote
    /// repository.
    Local { version: Option<String> },
    /// The full revision was cached when the project was opened.
    Cached(FileData),
}

/// A project loaded into the workspace registry.
#[derive(Clone, Debug)]
pub struct Project {
    repository: Arc<LocalRepository>,
    name: String,
    path: String,
    origin: ProjectOrigin,
}

impl Project {
    pub(crate) fn local(
        repository: Arc<LocalRepository>,
        name: String,
        path: String,
        version: Option<String>,
    ) -> Self {
        Self {
            repository,
            name,
            path,
            origin: ProjectOrigin::Local { version },
        }
    }

    pub(crate) fn cached(repository: Arc<LocalRepository>, path: String, data: FileData) -> Self {
        Self {
            repository,
            name: data.name.clone(),
            path,
            origin: ProjectOrigin::Cached(data),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry path: the resolved remote path, or a `<local-path>/` one.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn repository(&self) -> &LocalRepository {
        &self.repository
    }

    pub fn repository_id(&self) -> &str {
        self.repository.id()
    }

    pub fn origin(&self) -> &ProjectOrigin {
        &self.origin
    }

    pub fn version(&self) -> Option<&str> {
        match &self.origin {
            ProjectOrigin::Local { version } => version.as_deref(),
            ProjectOrigin::Cached(data) => data.version.as_deref(),
        }
    }

    pub fn file_data(&self) -> Option<&FileData> {
        match &self.origin {
            ProjectOrigin::Cached(data) => Some(data),
            ProjectOrigin::Local { .. } => None,
        }
    }

    /// Reads the modification marker from disk; not cached.
    pub fn is_modified(&self) -> bool {
        self.repository.project_state(&self.name).is_modified()
    }
}
