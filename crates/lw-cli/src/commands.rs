use anyhow::Result;
use lw_core::domain::{to_millis, FileData};
use lw_core::{Config, LocalStateError, LocalWorkspace, Project, Repository};
use serde_json::{json, Value};

use crate::cli::{CommandGroupCli, PathArgs, ProjectArgs, ProjectsArgs, VersionArgs};

pub struct Outcome {
    pub message: String,
    pub details: Value,
}

impl Outcome {
    fn new(message: impl Into<String>, details: Value) -> Self {
        Self {
            message: message.into(),
            details,
        }
    }
}

pub fn execute(config: &Config, command: &CommandGroupCli) -> Result<Outcome> {
    let workspace = config.open_workspace()?;
    let outcome = match command {
        CommandGroupCli::Projects(args) => projects(&workspace, args),
        CommandGroupCli::Files(args) => files(&workspace, args),
        CommandGroupCli::Status(args) => status(&workspace, args),
        CommandGroupCli::Version(args) => version(&workspace, args),
        CommandGroupCli::Touch(args) => touch(&workspace, args),
        CommandGroupCli::Clear(args) => clear(&workspace, args),
        CommandGroupCli::Info(args) => info(&workspace, args),
    };
    workspace.release();
    Ok(outcome?)
}

fn project_json(project: &Project) -> Value {
    json!({
        "name": project.name(),
        "repository": project.repository_id(),
        "path": project.path(),
        "version": project.version(),
        "modified": project.is_modified(),
    })
}

fn revision_json(data: &FileData) -> Value {
    json!({
        "name": data.name,
        "version": data.version,
        "author": data.author_name(),
        "modified_at": data.modified_at.map(to_millis),
        "size": data.size,
        "branch": data.branch,
        "comment": data.comment,
        "external_path": data.mapping.as_ref().map(|m| m.external_path.as_str()),
        "internal_path": data.mapping.as_ref().map(|m| m.internal_path.as_str()),
    })
}

fn projects(workspace: &LocalWorkspace, args: &ProjectsArgs) -> Result<Outcome, LocalStateError> {
    let projects = match &args.repository {
        Some(id) => workspace.projects_in(id),
        None => workspace.projects(),
    };
    let lines: Vec<String> = projects
        .iter()
        .map(|project| {
            format!(
                "{}\t{}\t{}\t{}",
                project.name(),
                project.repository_id(),
                project.version().unwrap_or("-"),
                project.path()
            )
        })
        .collect();
    let details = json!({ "projects": projects.iter().map(project_json).collect::<Vec<_>>() });
    Ok(Outcome::new(lines.join("\n"), details))
}

fn files(workspace: &LocalWorkspace, args: &PathArgs) -> Result<Outcome, LocalStateError> {
    let listed = workspace.local_repository().list(&args.path)?;
    let lines: Vec<String> = listed
        .iter()
        .map(|data| {
            format!(
                "{}\t{}\t{}",
                data.name,
                data.size,
                data.unique_id.as_deref().unwrap_or("-")
            )
        })
        .collect();
    let entries: Vec<Value> = listed
        .iter()
        .map(|data| {
            json!({
                "name": data.name,
                "size": data.size,
                "modified_at": data.modified_at.map(to_millis),
                "unique_id": data.unique_id,
            })
        })
        .collect();
    Ok(Outcome::new(lines.join("\n"), json!({ "files": entries })))
}

fn status(workspace: &LocalWorkspace, args: &ProjectArgs) -> Result<Outcome, LocalStateError> {
    let project = workspace.project(None, &args.project)?;
    let state = project.repository().project_state(project.name());
    let modified = state.is_modified();
    let message = format!(
        "{}: {} (version {})",
        project.name(),
        if modified { "modified" } else { "unchanged" },
        project.version().unwrap_or("unknown")
    );
    let details = json!({
        "name": project.name(),
        "modified": modified,
        "version": project.version(),
        "repository": state.repository_id()?,
    });
    Ok(Outcome::new(message, details))
}

fn version(workspace: &LocalWorkspace, args: &VersionArgs) -> Result<Outcome, LocalStateError> {
    let project = workspace.project(None, &args.project)?;
    let state = project.repository().project_state(project.name());
    if args.clear {
        state.set_version(None)?;
    } else if let Some(version) = &args.set {
        state.set_version(Some(version))?;
    }
    let current = state.version()?;
    let message = format!(
        "{}: {}",
        project.name(),
        current.as_deref().unwrap_or("unknown")
    );
    Ok(Outcome::new(
        message,
        json!({ "name": project.name(), "version": current }),
    ))
}

fn touch(workspace: &LocalWorkspace, args: &PathArgs) -> Result<Outcome, LocalStateError> {
    let trimmed = args.path.trim_matches('/');
    let (project_name, rest) = match trimmed.split_once('/') {
        Some((head, rest)) => (head, Some(rest)),
        None => (trimmed, None),
    };
    let project = workspace.project(None, project_name)?;
    let path = match rest {
        Some(rest) => format!("{}/{rest}", project.name()),
        None => project.name().to_string(),
    };
    project.repository().project_state(&path).notify_modified()?;
    Ok(Outcome::new(
        format!("{path}: marked modified"),
        json!({ "path": path, "modified": true }),
    ))
}

fn clear(workspace: &LocalWorkspace, args: &ProjectArgs) -> Result<Outcome, LocalStateError> {
    let project = workspace.project(None, &args.project)?;
    project
        .repository()
        .project_state(project.name())
        .clear_modify_status()?;
    Ok(Outcome::new(
        format!("{}: modification status cleared", project.name()),
        json!({ "name": project.name(), "modified": false }),
    ))
}

fn info(workspace: &LocalWorkspace, args: &ProjectArgs) -> Result<Outcome, LocalStateError> {
    let project = workspace.project(None, &args.project)?;
    let Some(data) = project.file_data() else {
        return Ok(Outcome::new(
            format!("{}: no cached revision", project.name()),
            json!({ "name": project.name(), "revision": Value::Null }),
        ));
    };
    let message = format!(
        "{} {} by {} ({} bytes)",
        project.name(),
        data.version.as_deref().unwrap_or("-"),
        data.author_name().unwrap_or("-"),
        data.size
    );
    Ok(Outcome::new(
        message,
        json!({ "name": project.name(), "revision": revision_json(data) }),
    ))
}
