use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

pub const LW_BEFORE_HELP: &str = concat!(
    "lw ",
    env!("CARGO_PKG_VERSION"),
    " – local workspace inspector\n\n",
    "  projects         List projects loaded from the workspace root.\n",
    "  files            List files with cached unique-ids; sidecar records stay hidden.\n",
    "  status           Show whether a project changed since it was opened.\n",
    "  version          Read, set or forget the cached project version.\n",
    "  touch            Mark a project or a file inside it as modified.\n",
    "  clear            Clear the modification status of a project.\n",
    "  info             Print the cached revision of a project.\n",
);

#[derive(Parser, Debug)]
#[command(author, version, disable_help_subcommand = true, before_help = LW_BEFORE_HELP)]
pub struct LwCli {
    #[arg(long, help = "Workspace root (defaults to LW_WORKSPACE_ROOT or the current dir)", global = true)]
    pub root: Option<PathBuf>,
    #[arg(long, help = "User owning the workspace (defaults to LW_USER)", global = true)]
    pub user: Option<String>,
    #[arg(long, help = "Design-time rules location prefix", global = true)]
    pub rules_location: Option<String>,
    #[arg(long, help = "JSON file describing design-time repositories", global = true)]
    pub design_repos: Option<PathBuf>,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)", global = true)]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v", global = true)]
    pub trace: bool,
    #[arg(long, help = "Emit JSON instead of human output", global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    /// List projects, sorted by name.
    Projects(ProjectsArgs),
    /// List files under a path.
    Files(PathArgs),
    /// Show the modification status of a project.
    Status(ProjectArgs),
    /// Read or change the cached version of a project.
    Version(VersionArgs),
    /// Mark a project, or a file inside it, as modified.
    Touch(PathArgs),
    /// Clear the modification status of a project.
    Clear(ProjectArgs),
    /// Print the cached revision of a project.
    Info(ProjectArgs),
}

#[derive(Args, Debug)]
pub struct ProjectsArgs {
    #[arg(long, help = "Only projects bound to this repository id")]
    pub repository: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProjectArgs {
    pub project: String,
}

#[derive(Args, Debug)]
pub struct PathArgs {
    pub path: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    pub project: String,
    #[arg(long, conflicts_with = "clear", help = "Cache this version")]
    pub set: Option<String>,
    #[arg(long, help = "Forget the cached version")]
    pub clear: bool,
}
