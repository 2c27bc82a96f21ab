//! In-memory registry of the projects checked out into one user's workspace.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lw_domain::{FileMapping, ProjectKey};
use tracing::{debug, info};

use crate::design::DesignTimeRepository;
use crate::local::{CachedFileData, LocalRepository, LOCAL_ID};
use crate::store::Repository;
use crate::{LocalStateError, Result};

mod listener;
mod project;
#[cfg(test)]
mod tests;

pub use listener::{WorkspaceEvent, WorkspaceListener};
pub use project::{Project, ProjectOrigin};

/// Registry path prefix of projects that have no cached revision.
pub const LOCAL_PATH_PREFIX: &str = "<local-path>/";

type Registry = BTreeMap<ProjectKey, Project>;

pub struct LocalWorkspace {
    user_id: String,
    location: PathBuf,
    repository: LocalRepository,
    design: Arc<dyn DesignTimeRepository>,
    projects: Mutex<Registry>,
    listeners: Mutex<Vec<Arc<dyn WorkspaceListener>>>,
    released: AtomicBool,
}

impl std::fmt::Debug for LocalWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWorkspace")
            .field("user_id", &self.user_id)
            .field("location", &self.location)
            .field("released", &self.released.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn by_name(a: &Project, b: &Project) -> std::cmp::Ordering {
    a.name().to_lowercase().cmp(&b.name().to_lowercase())
}

fn matches(project: &Project, repository_id: Option<&str>, name: &str) -> bool {
    repository_id.is_none_or(|id| id == project.repository_id())
        && project.name().to_lowercase() == name.to_lowercase()
}

impl LocalWorkspace {
    /// Opens the workspace rooted at `location` and loads every project found
    /// there.
    pub fn open(
        user_id: impl Into<String>,
        location: impl Into<PathBuf>,
        design: Arc<dyn DesignTimeRepository>,
    ) -> Result<Self> {
        let location = location.into();
        let repository = LocalRepository::new(location.clone());
        repository.initialize()?;
        let workspace = Self {
            user_id: user_id.into(),
            location,
            repository,
            design,
            projects: Mutex::new(Registry::new()),
            listeners: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        };
        let loaded = workspace.load_projects()?;
        *workspace.registry() = loaded;
        Ok(workspace)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Shared repository over the workspace root, id [`LOCAL_ID`].
    pub fn local_repository(&self) -> &LocalRepository {
        &self.repository
    }

    /// A new repository over the workspace root, stamped with `id` (default
    /// [`LOCAL_ID`]) and the display name of the matching design repository.
    /// Each call returns a distinct instance.
    pub fn repository(&self, id: Option<&str>) -> Result<LocalRepository> {
        let id = id.unwrap_or(LOCAL_ID);
        let name = self
            .design
            .repository(id)
            .map(|remote| remote.name().to_string());
        let repository = LocalRepository::new(self.repository.root()).with_identity(id, name);
        repository.initialize()?;
        Ok(repository)
    }

    pub fn project(&self, repository_id: Option<&str>, name: &str) -> Result<Project> {
        self.registry()
            .values()
            .find(|project| matches(project, repository_id, name))
            .cloned()
            .ok_or_else(|| LocalStateError::not_found(name))
    }

    pub fn project_for_path(&self, repository_id: &str, path: &str) -> Option<Project> {
        self.registry()
            .get(&ProjectKey::new(repository_id, path))
            .cloned()
    }

    pub fn projects(&self) -> Vec<Project> {
        let mut projects: Vec<_> = self.registry().values().cloned().collect();
        projects.sort_by(by_name);
        projects
    }

    pub fn projects_in(&self, repository_id: &str) -> Vec<Project> {
        let mut projects: Vec<_> = self
            .registry()
            .iter()
            .filter(|(key, _)| key.repository_id == repository_id)
            .map(|(_, project)| project.clone())
            .collect();
        projects.sort_by(by_name);
        projects
    }

    pub fn has_project(&self, repository_id: Option<&str>, name: &str) -> bool {
        self.registry()
            .values()
            .any(|project| matches(project, repository_id, name))
    }

    /// Replaces the registry with what is on disk now. Readers see either the
    /// old or the new registry, never a half-built one.
    pub fn refresh(&self) -> Result<()> {
        let count = {
            let mut projects = self.registry();
            if self.is_released() {
                return Err(LocalStateError::Released);
            }
            projects.clear();
            *projects = self.load_projects()?;
            projects.len()
        };
        debug!(projects = count, "workspace refreshed");
        self.dispatch(WorkspaceEvent::Refreshed { projects: count });
        Ok(())
    }

    /// Drops every project and closes the backing repository. Releasing again
    /// is a no-op.
    pub fn release(&self) {
        let first = {
            let mut projects = self.registry();
            projects.clear();
            !self.released.swap(true, Ordering::SeqCst)
        };
        if !first {
            return;
        }
        self.repository.close();
        info!(user = %self.user_id, location = %self.location.display(), "workspace released");
        self.dispatch(WorkspaceEvent::Released);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn add_listener(&self, listener: Arc<dyn WorkspaceListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn WorkspaceListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.projects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, event: WorkspaceEvent) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_event(self, event);
        }
    }

    fn load_projects(&self) -> Result<Registry> {
        let rules_location = self.design.rules_location();
        let mut projects = Registry::new();
        for folder in self.repository.list_folders("")? {
            let name = folder.name;
            let state = self.repository.project_state(&name);
            let repository = Arc::new(self.repository(state.repository_id()?.as_deref())?);

            let project = match state.file_data()? {
                CachedFileData::Complete(mut data) => {
                    let path = match data.mapping.as_mut() {
                        Some(mapping) => {
                            self.resolve_mapping(repository.id(), &name, mapping)?;
                            mapping.internal_path.clone()
                        }
                        None => format!("{rules_location}{name}"),
                    };
                    Project::cached(Arc::clone(&repository), path, data)
                }
                CachedFileData::Missing | CachedFileData::Partial => {
                    let version = state.version()?;
                    let path = format!("{LOCAL_PATH_PREFIX}{name}");
                    Project::local(Arc::clone(&repository), name.clone(), path, version)
                }
            };
            debug!(project = %name, repository = repository.id(), path = project.path(), "loaded project");
            projects.insert(ProjectKey::new(repository.id(), project.path()), project);
        }
        Ok(projects)
    }

    /// Points `mapping.external_path` at the name the design repository
    /// knows the project by, allocating one if it has none yet.
    fn resolve_mapping(
        &self,
        repository_id: &str,
        name: &str,
        mapping: &mut FileMapping,
    ) -> Result<()> {
        let rules_location = self.design.rules_location();
        let mut mapped_name = name.to_string();
        if let Some(remote) = self.design.repository(repository_id) {
            if let Some(mapper) = remote
                .folder_mapper()
                .filter(|_| remote.features().mapped_folders)
            {
                mapped_name = match mapper
                    .find_mapped_name(&mapping.internal_path)
                    .map_err(LocalStateError::Remote)?
                {
                    Some(mapped) => mapped
                        .strip_prefix(rules_location)
                        .unwrap_or(&mapped)
                        .to_string(),
                    None => mapper
                        .get_mapped_name(name, &mapping.internal_path)
                        .map_err(LocalStateError::Remote)?,
                };
            }
        }
        mapping.external_path = format!("{rules_location}{mapped_name}");
        Ok(())
    }
}
