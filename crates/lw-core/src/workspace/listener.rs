use super::LocalWorkspace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkspaceEvent {
    /// The registry was rebuilt from disk.
    Refreshed { projects: usize },
    /// The workspace was released; it holds no projects any more.
    Released,
}

/// Observer of workspace lifecycle transitions.
///
/// Events are delivered on the thread that caused them, after the registry
/// lock is dropped, so a listener may call back into the workspace (or remove
/// itself) without deadlocking.
pub trait WorkspaceListener: Send + Sync {
    fn on_event(&self, workspace: &LocalWorkspace, event: WorkspaceEvent);
}
