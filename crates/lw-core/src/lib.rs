#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

mod config;
pub mod design;
mod error;
pub mod local;
pub mod sidecar;
pub mod store;
pub mod workspace;

pub use config::{Config, DEFAULT_RULES_LOCATION};
pub use design::{
    DesignTimeRepository, FolderMapper, RemoteRepository, StaticDesignRepository,
    StaticRemoteRepository,
};
pub use error::{LocalStateError, Result};
pub use local::{CachedFileData, LocalRepository, ProjectState, LOCAL_ID};
pub use store::{ChangeListener, FileSystemRepository, Repository};
pub use workspace::{LocalWorkspace, Project, ProjectOrigin, WorkspaceEvent, WorkspaceListener};

pub use lw_domain as domain;
