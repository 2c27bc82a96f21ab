use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::design::{DesignTimeRepository, StaticDesignRepository};
use crate::workspace::LocalWorkspace;

pub const DEFAULT_RULES_LOCATION: &str = "DESIGN/rules/";

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Where the workspace lives and who it belongs to.
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace_root: PathBuf,
    pub user_id: String,
    pub rules_location: String,
    pub design_repos: Option<PathBuf>,
}

impl Config {
    /// Builds a configuration from the current process environment.
    ///
    /// # Errors
    /// Returns an error if the current directory cannot be determined.
    pub fn from_env() -> Result<Self> {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Result<Self> {
        let workspace_root = match snapshot.var("LW_WORKSPACE_ROOT") {
            Some(root) => PathBuf::from(root),
            None => env::current_dir().context("unable to determine workspace root")?,
        };
        let user_id = snapshot
            .var("LW_USER")
            .or_else(|| snapshot.var("USER"))
            .unwrap_or("anonymous")
            .to_string();
        Ok(Self {
            workspace_root,
            user_id,
            rules_location: snapshot
                .var("LW_RULES_LOCATION")
                .unwrap_or(DEFAULT_RULES_LOCATION)
                .to_string(),
            design_repos: snapshot.var("LW_DESIGN_REPOS").map(PathBuf::from),
        })
    }

    /// Design-time repositories described by `design_repos`, or none at all.
    pub fn design_repository(&self) -> Result<Arc<dyn DesignTimeRepository>> {
        let design = match &self.design_repos {
            Some(path) => StaticDesignRepository::from_json_file(path, &self.rules_location)?,
            None => StaticDesignRepository::new(self.rules_location.clone()),
        };
        Ok(Arc::new(design))
    }

    pub fn open_workspace(&self) -> Result<LocalWorkspace> {
        let design = self.design_repository()?;
        LocalWorkspace::open(self.user_id.clone(), &self.workspace_root, design).with_context(
            || format!("opening workspace at {}", self.workspace_root.display()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_overrides_from_environment() {
        let snapshot = EnvSnapshot::testing(&[
            ("LW_WORKSPACE_ROOT", "/srv/ws"),
            ("LW_USER", "jdoe"),
            ("USER", "root"),
            ("LW_RULES_LOCATION", "rules/"),
            ("LW_DESIGN_REPOS", "/etc/lw/repos.json"),
        ]);
        let config = Config::from_snapshot(&snapshot).unwrap();
        assert_eq!(config.workspace_root, PathBuf::from("/srv/ws"));
        assert_eq!(config.user_id, "jdoe");
        assert_eq!(config.rules_location, "rules/");
        assert_eq!(config.design_repos, Some(PathBuf::from("/etc/lw/repos.json")));
    }

    #[test]
    fn falls_back_to_defaults() {
        let snapshot = EnvSnapshot::testing(&[("LW_WORKSPACE_ROOT", "/srv/ws"), ("LW_USER", "")]);
        let config = Config::from_snapshot(&snapshot).unwrap();
        assert_eq!(config.user_id, "anonymous");
        assert_eq!(config.rules_location, DEFAULT_RULES_LOCATION);
        assert_eq!(config.design_repos, None);
        assert_eq!(config.design_repository().unwrap().rules_location(), DEFAULT_RULES_LOCATION);
    }
}
