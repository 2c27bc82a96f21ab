use std::io;
use std::path::{Path, PathBuf};

pub type Result<T, E = LocalStateError> = std::result::Result<T, E>;

pub(crate) mod codes {
    pub const IO_FAILURE: &str = "LW100";
    pub const CORRUPT_RECORD: &str = "LW110";
    pub const NOT_FOUND: &str = "LW120";
    pub const RELEASED: &str = "LW130";
    pub const REMOTE: &str = "LW140";
}

/// Errors surfaced by the local workspace layer.
///
/// Only [`LocalStateError::NotFound`] is meant for end users as-is; every
/// other variant is a local-state fault with its cause attached.
#[derive(Debug, thiserror::Error)]
pub enum LocalStateError {
    #[error("[LW100] local state I/O failed: {context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("[LW110] local state record {} is corrupt: {reason}", path.display())]
    CorruptRecord { path: PathBuf, reason: String },
    #[error("Cannot find project '{name}'.")]
    NotFound { name: String },
    #[error("[LW130] local workspace has been released")]
    Released,
    #[error("[LW140] design repository request failed")]
    Remote(#[source] anyhow::Error),
}

impl LocalStateError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => codes::IO_FAILURE,
            Self::CorruptRecord { .. } => codes::CORRUPT_RECORD,
            Self::NotFound { .. } => codes::NOT_FOUND,
            Self::Released => codes::RELEASED,
            Self::Remote(_) => codes::REMOTE,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &Path, reason: impl ToString) -> Self {
        Self::CorruptRecord {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }
}

/// Attaches a path-aware context to raw I/O results, in the spirit of
/// `anyhow::Context` but producing [`LocalStateError::Io`].
pub(crate) trait IoContext<T> {
    fn io_context(self, action: &str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context(self, action: &str, path: &Path) -> Result<T> {
        self.map_err(|err| LocalStateError::io(format!("{action} {}", path.display()), err))
    }
}
