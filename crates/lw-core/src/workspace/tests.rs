use super::*;

use std::collections::BTreeMap;
use std::fs;
use std::sync::Mutex;

use lw_domain::{FileData, UserInfo};
use tempfile::{tempdir, TempDir};
use time::macros::datetime;

use crate::design::{StaticDesignRepository, StaticRemoteRepository};

const RULES: &str = "DESIGN/rules/";

fn design() -> Arc<dyn DesignTimeRepository> {
    Arc::new(
        StaticDesignRepository::new(RULES)
            .with_repository(StaticRemoteRepository::new("design", "Design", RULES))
            .with_repository(
                StaticRemoteRepository::new("mapped", "Mapped", RULES).with_mapped_folders(
                    BTreeMap::from([(
                        "projects/team-a/Loans".to_string(),
                        "DESIGN/rules/Team Loans".to_string(),
                    )]),
                ),
            ),
    )
}

fn project_folder(root: &Path, name: &str) {
    let folder = root.join(name);
    fs::create_dir_all(&folder).unwrap();
    fs::write(folder.join("rules.xlsx"), name).unwrap();
}

fn revision(name: &str, version: &str) -> FileData {
    FileData {
        size: 10,
        modified_at: Some(datetime!(2024-02-03 04:05:06.789 UTC)),
        author: Some(UserInfo::new("jdoe")),
        version: Some(version.to_string()),
        ..FileData::named(name)
    }
}

fn open(dir: &TempDir) -> LocalWorkspace {
    LocalWorkspace::open("jdoe", dir.path(), design()).unwrap()
}

fn names(projects: &[Project]) -> Vec<&str> {
    projects.iter().map(Project::name).collect()
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<WorkspaceEvent>>,
}

impl WorkspaceListener for Recorder {
    fn on_event(&self, _workspace: &LocalWorkspace, event: WorkspaceEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[test]
fn bare_version_record_yields_local_project() {
    let dir = tempdir().unwrap();
    project_folder(dir.path(), "Loans");
    LocalRepository::new(dir.path())
        .project_state("Loans")
        .set_version(Some("3"))
        .unwrap();

    let workspace = open(&dir);
    let project = workspace.project(None, "Loans").unwrap();
    assert_eq!(project.version(), Some("3"));
    assert_eq!(project.repository_id(), LOCAL_ID);
    assert_eq!(project.path(), "<local-path>/Loans");
    assert!(project.file_data().is_none());
    assert!(workspace
        .project_for_path(LOCAL_ID, "<local-path>/Loans")
        .is_some());
}

#[test]
fn cached_revision_is_keyed_by_rules_location() {
    let dir = tempdir().unwrap();
    project_folder(dir.path(), "Cards");
    LocalRepository::new(dir.path())
        .project_state("Cards")
        .save_file_data("design", &revision("Cards", "12"))
        .unwrap();

    let workspace = open(&dir);
    let project = workspace
        .project_for_path("design", "DESIGN/rules/Cards")
        .unwrap();
    assert_eq!(project.version(), Some("12"));
    assert_eq!(project.path(), "DESIGN/rules/Cards");
    assert_eq!(project.repository().name(), Some("Design"));
    assert_eq!(project.file_data().unwrap().author_name(), Some("jdoe"));
}

#[test]
fn existing_folder_mapping_is_reused() {
    let dir = tempdir().unwrap();
    project_folder(dir.path(), "Loans");
    let data = FileData {
        mapping: Some(FileMapping::new("Loans", "projects/team-a/Loans")),
        ..revision("Loans", "5")
    };
    LocalRepository::new(dir.path())
        .project_state("Loans")
        .save_file_data("mapped", &data)
        .unwrap();

    let workspace = open(&dir);
    let project = workspace
        .project_for_path("mapped", "projects/team-a/Loans")
        .unwrap();
    let mapping = project.file_data().unwrap().mapping.clone().unwrap();
    assert_eq!(mapping.external_path, "DESIGN/rules/Team Loans");
    assert_eq!(mapping.internal_path, "projects/team-a/Loans");
}

#[test]
fn missing_folder_mapping_is_allocated() {
    let dir = tempdir().unwrap();
    project_folder(dir.path(), "Team Loans");
    let data = FileData {
        mapping: Some(FileMapping::new("Team Loans", "projects/team-b/Loans")),
        ..revision("Team Loans", "1")
    };
    LocalRepository::new(dir.path())
        .project_state("Team Loans")
        .save_file_data("mapped", &data)
        .unwrap();

    let workspace = open(&dir);
    let project = workspace
        .project_for_path("mapped", "projects/team-b/Loans")
        .unwrap();
    let mapping = project.file_data().unwrap().mapping.as_ref().unwrap();
    assert_eq!(mapping.external_path, "DESIGN/rules/Team Loans-1");
}

#[test]
fn lookups_ignore_case_and_filter_by_repository() {
    let dir = tempdir().unwrap();
    project_folder(dir.path(), "Loans");
    let workspace = open(&dir);

    assert!(workspace.has_project(None, "loans"));
    assert!(workspace.has_project(Some(LOCAL_ID), "LOANS"));
    assert!(!workspace.has_project(Some("design"), "Loans"));
    assert_eq!(workspace.project(None, "lOaNs").unwrap().name(), "Loans");

    let err = workspace.project(Some("design"), "Loans").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Cannot find project 'Loans'.");
}

#[test]
fn projects_are_sorted_ignoring_case() {
    let dir = tempdir().unwrap();
    for name in ["gamma", "Beta", "alpha"] {
        project_folder(dir.path(), name);
    }
    LocalRepository::new(dir.path())
        .project_state("Beta")
        .save_file_data("design", &revision("Beta", "2"))
        .unwrap();

    let workspace = open(&dir);
    assert_eq!(names(&workspace.projects()), ["alpha", "Beta", "gamma"]);
    assert_eq!(names(&workspace.projects_in(LOCAL_ID)), ["alpha", "gamma"]);
    assert_eq!(names(&workspace.projects_in("design")), ["Beta"]);
    assert!(workspace.projects_in("mapped").is_empty());
}

#[test]
fn registry_follows_disk_only_on_refresh() {
    let dir = tempdir().unwrap();
    project_folder(dir.path(), "Loans");
    let workspace = open(&dir);
    let recorder = Arc::new(Recorder::default());
    workspace.add_listener(recorder.clone());

    project_folder(dir.path(), "Cards");
    assert_eq!(names(&workspace.projects()), ["Loans"]);

    workspace.refresh().unwrap();
    assert_eq!(names(&workspace.projects()), ["Cards", "Loans"]);
    assert_eq!(
        *recorder.events.lock().unwrap(),
        [WorkspaceEvent::Refreshed { projects: 2 }]
    );
}

#[test]
fn sidecar_only_folders_are_not_projects() {
    let dir = tempdir().unwrap();
    project_folder(dir.path(), "Loans");
    fs::create_dir_all(dir.path().join(crate::sidecar::PROPERTIES_FOLDER)).unwrap();
    let workspace = open(&dir);
    assert_eq!(names(&workspace.projects()), ["Loans"]);
}

#[test]
fn repositories_are_fresh_instances() {
    let dir = tempdir().unwrap();
    let workspace = open(&dir);
    let first = workspace.repository(Some("design")).unwrap();
    let second = workspace.repository(Some("design")).unwrap();
    first.close();
    assert_eq!(second.id(), "design");
    assert_eq!(first.id(), "design");
    assert_eq!(first.name(), Some("Design"));
    assert_eq!(first.root(), workspace.location());

    let local = workspace.repository(None).unwrap();
    assert_eq!(local.id(), LOCAL_ID);
    assert_eq!(local.name(), None);
}

#[test]
fn release_is_idempotent_and_notifies_once() {
    let dir = tempdir().unwrap();
    project_folder(dir.path(), "Loans");
    let workspace = open(&dir);
    let recorder = Arc::new(Recorder::default());
    workspace.add_listener(recorder.clone());

    workspace.release();
    assert!(workspace.projects().is_empty());
    workspace.release();
    assert!(workspace.projects().is_empty());
    assert!(workspace.is_released());
    assert_eq!(*recorder.events.lock().unwrap(), [WorkspaceEvent::Released]);
    assert!(matches!(workspace.refresh(), Err(LocalStateError::Released)));
}

#[test]
fn release_is_terminal_under_concurrent_refresh() {
    for _ in 0..20 {
        let dir = tempdir().unwrap();
        for name in ["a", "b"] {
            project_folder(dir.path(), name);
        }
        let workspace = open(&dir);

        std::thread::scope(|scope| {
            scope.spawn(|| while workspace.refresh().is_ok() {});
            scope.spawn(|| workspace.release());
        });

        assert!(workspace.is_released());
        assert!(workspace.projects().is_empty());
    }
}

struct SelfRemoving {
    me: Mutex<Option<Arc<dyn WorkspaceListener>>>,
    seen: Mutex<Vec<usize>>,
}

impl WorkspaceListener for SelfRemoving {
    fn on_event(&self, workspace: &LocalWorkspace, _event: WorkspaceEvent) {
        self.seen.lock().unwrap().push(workspace.projects().len());
        if let Some(me) = self.me.lock().unwrap().take() {
            workspace.remove_listener(&me);
        }
    }
}

#[test]
fn listeners_may_reenter_and_deregister() {
    let dir = tempdir().unwrap();
    project_folder(dir.path(), "Loans");
    let workspace = open(&dir);
    let listener = Arc::new(SelfRemoving {
        me: Mutex::new(None),
        seen: Mutex::new(Vec::new()),
    });
    let as_dyn: Arc<dyn WorkspaceListener> = listener.clone();
    *listener.me.lock().unwrap() = Some(Arc::clone(&as_dyn));
    workspace.add_listener(as_dyn);
    let recorder = Arc::new(Recorder::default());
    workspace.add_listener(recorder.clone());

    workspace.refresh().unwrap();
    workspace.release();

    assert_eq!(*listener.seen.lock().unwrap(), [1]);
    assert_eq!(
        *recorder.events.lock().unwrap(),
        [
            WorkspaceEvent::Refreshed { projects: 1 },
            WorkspaceEvent::Released
        ]
    );
}

#[test]
fn readers_never_observe_a_partial_registry() {
    let dir = tempdir().unwrap();
    for name in ["a", "b", "c", "d"] {
        project_folder(dir.path(), name);
    }
    let workspace = open(&dir);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..20 {
                workspace.refresh().unwrap();
            }
        });
        for _ in 0..2 {
            scope.spawn(|| {
                for _ in 0..50 {
                    assert_eq!(workspace.projects().len(), 4);
                }
            });
        }
    });
}

#[test]
fn refresh_surfaces_corrupt_revision() {
    let dir = tempdir().unwrap();
    project_folder(dir.path(), "Loans");
    let workspace = open(&dir);
    let record = workspace
        .local_repository()
        .sidecar()
        .create("Loans", ".version")
        .unwrap();
    fs::write(
        record,
        "version=1\nauthor=jdoe\nmodified-at-long=1000\nsize=-\n",
    )
    .unwrap();

    let err = workspace.refresh().unwrap_err();
    assert_eq!(err.code(), "LW110");
}
