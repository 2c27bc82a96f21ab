use std::fmt;

/// Registry key of a loaded project: the repository it belongs to plus the
/// path the project has inside that repository.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectKey {
    pub repository_id: String,
    pub path: String,
}

impl ProjectKey {
    pub fn new(repository_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            repository_id: repository_id.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository_id, self.path)
    }
}
