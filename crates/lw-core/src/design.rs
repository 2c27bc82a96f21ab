//! Contract of the design-time repositories projects are checked out from.
//!
//! The workspace only needs three things from them: where rule projects live
//! (`rules_location`), a display name per repository, and, for repositories
//! that map folders, a translation from internal paths to project names.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use lw_domain::Features;
use serde::Deserialize;

pub trait FolderMapper: Send + Sync {
    /// Name already assigned to `internal_path`, if any.
    fn find_mapped_name(&self, internal_path: &str) -> Result<Option<String>>;
    /// Assigns a project name to `internal_path`, preferring `name`.
    fn get_mapped_name(&self, name: &str, internal_path: &str) -> Result<String>;
}

pub trait RemoteRepository: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn features(&self) -> Features;
    fn folder_mapper(&self) -> Option<&dyn FolderMapper> {
        None
    }
}

pub trait DesignTimeRepository: Send + Sync {
    fn rules_location(&self) -> &str;
    fn repository(&self, id: &str) -> Option<Arc<dyn RemoteRepository>>;
}

#[derive(Debug, Deserialize)]
struct DesignReposFile {
    #[serde(default)]
    rules_location: Option<String>,
    #[serde(default)]
    repositories: Vec<RemoteRepoEntry>,
}

#[derive(Debug, Deserialize)]
struct RemoteRepoEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    mapped_folders: bool,
    #[serde(default)]
    mappings: BTreeMap<String, String>,
}

/// Design-time repositories described up front rather than discovered from a
/// live server.
pub struct StaticDesignRepository {
    rules_location: String,
    repositories: Vec<Arc<StaticRemoteRepository>>,
}

impl StaticDesignRepository {
    pub fn new(rules_location: impl Into<String>) -> Self {
        Self {
            rules_location: rules_location.into(),
            repositories: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_repository(mut self, repository: StaticRemoteRepository) -> Self {
        self.repositories.push(Arc::new(repository));
        self
    }

    /// Reads a JSON description:
    ///
    /// ```json
    /// { "rules_location": "DESIGN/rules/",
    ///   "repositories": [{ "id": "design", "name": "Design", "mapped_folders": true,
    ///                      "mappings": { "projects/loans": "DESIGN/rules/Loans" } }] }
    /// ```
    ///
    /// `default_rules_location` applies when the file does not name one.
    pub fn from_json_file(path: &Path, default_rules_location: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let parsed: DesignReposFile = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        let rules_location = parsed
            .rules_location
            .unwrap_or_else(|| default_rules_location.to_string());
        let mut design = Self::new(rules_location.clone());
        for entry in parsed.repositories {
            let name = entry.name.unwrap_or_else(|| entry.id.clone());
            let mut repository = StaticRemoteRepository::new(entry.id, name, &rules_location);
            if entry.mapped_folders {
                repository = repository.with_mapped_folders(entry.mappings);
            }
            design = design.with_repository(repository);
        }
        Ok(design)
    }
}

impl DesignTimeRepository for StaticDesignRepository {
    fn rules_location(&self) -> &str {
        &self.rules_location
    }

    fn repository(&self, id: &str) -> Option<Arc<dyn RemoteRepository>> {
        self.repositories
            .iter()
            .find(|repository| repository.id == id)
            .map(|repository| Arc::clone(repository) as Arc<dyn RemoteRepository>)
    }
}

pub struct StaticRemoteRepository {
    id: String,
    name: String,
    rules_location: String,
    /// internal path -> mapped path; `None` when folders are not mapped.
    mappings: Option<Mutex<BTreeMap<String, String>>>,
}

impl StaticRemoteRepository {
    pub fn new(id: impl Into<String>, name: impl Into<String>, rules_location: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rules_location: rules_location.to_string(),
            mappings: None,
        }
    }

    #[must_use]
    pub fn with_mapped_folders(mut self, mappings: BTreeMap<String, String>) -> Self {
        self.mappings = Some(Mutex::new(mappings));
        self
    }
}

impl RemoteRepository for StaticRemoteRepository {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn features(&self) -> Features {
        Features {
            versions: true,
            mapped_folders: self.mappings.is_some(),
            folders: true,
            unique_file_id: false,
        }
    }

    fn folder_mapper(&self) -> Option<&dyn FolderMapper> {
        self.mappings.is_some().then_some(self as &dyn FolderMapper)
    }
}

impl FolderMapper for StaticRemoteRepository {
    fn find_mapped_name(&self, internal_path: &str) -> Result<Option<String>> {
        let Some(mappings) = &self.mappings else {
            return Ok(None);
        };
        let mappings = mappings.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(mappings.get(internal_path).cloned())
    }

    fn get_mapped_name(&self, name: &str, internal_path: &str) -> Result<String> {
        let Some(mappings) = &self.mappings else {
            anyhow::bail!("repository '{}' does not map folders", self.id);
        };
        let mut mappings = mappings.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = mappings.get(internal_path) {
            return Ok(existing
                .strip_prefix(&self.rules_location)
                .unwrap_or(existing)
                .to_string());
        }
        let taken = |candidate: &str| {
            let full = format!("{}{candidate}", self.rules_location);
            mappings.values().any(|mapped| *mapped == full)
        };
        let mut candidate = name.to_string();
        let mut suffix = 0;
        while taken(&candidate) {
            suffix += 1;
            candidate = format!("{name}-{suffix}");
        }
        mappings.insert(
            internal_path.to_string(),
            format!("{}{candidate}", self.rules_location),
        );
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn allocated_names_avoid_collisions() {
        let repository = StaticRemoteRepository::new("design", "Design", "DESIGN/rules/")
            .with_mapped_folders(BTreeMap::from([(
                "projects/a/Loans".to_string(),
                "DESIGN/rules/Loans".to_string(),
            )]));
        let mapper = repository.folder_mapper().unwrap();

        assert_eq!(
            mapper.find_mapped_name("projects/a/Loans").unwrap().as_deref(),
            Some("DESIGN/rules/Loans")
        );
        assert_eq!(mapper.find_mapped_name("projects/b/Loans").unwrap(), None);
        assert_eq!(
            mapper.get_mapped_name("Loans", "projects/b/Loans").unwrap(),
            "Loans-1"
        );
        assert_eq!(
            mapper.get_mapped_name("Loans", "projects/b/Loans").unwrap(),
            "Loans-1"
        );
        assert_eq!(
            mapper.find_mapped_name("projects/b/Loans").unwrap().as_deref(),
            Some("DESIGN/rules/Loans-1")
        );
    }

    #[test]
    fn plain_repositories_have_no_mapper() {
        let repository = StaticRemoteRepository::new("flat", "Flat", "DESIGN/rules/");
        assert!(!repository.features().mapped_folders);
        assert!(repository.folder_mapper().is_none());
        assert!(repository.get_mapped_name("Loans", "x").is_err());
    }

    #[test]
    fn loads_description_from_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repos.json");
        fs::write(
            &path,
            r#"{
  "repositories": [
    { "id": "design", "name": "Design", "mapped_folders": true,
      "mappings": { "projects/loans": "DESIGN/rules/Loans" } },
    { "id": "flat" }
  ]
}"#,
        )
        .unwrap();

        let design = StaticDesignRepository::from_json_file(&path, "DESIGN/rules/").unwrap();
        assert_eq!(design.rules_location(), "DESIGN/rules/");
        let mapped = design.repository("design").unwrap();
        assert_eq!(mapped.name(), "Design");
        assert!(mapped.features().mapped_folders);
        let flat = design.repository("flat").unwrap();
        assert_eq!(flat.name(), "flat");
        assert!(!flat.features().mapped_folders);
        assert!(design.repository("other").is_none());
    }
}
