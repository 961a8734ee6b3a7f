use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use configsync::Action;
use std::path::PathBuf;

use crate::bundle::DEFAULT_ROOT;

#[derive(Parser)]
#[command(name = "bundlesync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Write remote drift back into bundle configuration files", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply a planner change set to the bundle's source files
    Sync(SyncArgs),

    /// Show where a field path lands in the bundle's source files
    Resolve(ResolveArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared
// ============================================================================

#[derive(Args, Clone)]
pub struct BundleArgs {
    /// Root configuration file of the bundle
    #[arg(short, long, default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Target whose overlay is active
    #[arg(short, long, env = "BUNDLE_TARGET")]
    pub target: Option<String>,

    /// Settings file (default: bundlesync.toml beside the root file)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

// ============================================================================
// Sync
// ============================================================================

#[derive(Args)]
pub struct SyncArgs {
    /// JSON change set produced by the planner
    #[arg(short, long)]
    pub changes: PathBuf,

    #[command(flatten)]
    pub bundle: BundleArgs,

    /// Show the diffs without writing any file
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

// ============================================================================
// Resolve
// ============================================================================

#[derive(Args)]
pub struct ResolveArgs {
    /// Field path, e.g. resources.jobs.etl.tasks[task_key='main'].timeout_seconds
    pub field: String,

    #[command(flatten)]
    pub bundle: BundleArgs,

    /// Kind of change to resolve for
    #[arg(short, long, value_enum, default_value_t = ActionArg::Replace)]
    pub action: ActionArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    Add,
    Replace,
    Remove,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Add => Action::Add,
            ActionArg::Replace => Action::Replace,
            ActionArg::Remove => Action::Remove,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_args() {
        let cli = Cli::parse_from([
            "bundlesync",
            "sync",
            "--changes",
            "plan.json",
            "--target",
            "dev",
            "-n",
        ]);
        let Command::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.changes, PathBuf::from("plan.json"));
        assert_eq!(args.bundle.root, PathBuf::from(DEFAULT_ROOT));
        assert_eq!(args.bundle.target.as_deref(), Some("dev"));
        assert!(args.dry_run);
    }

    #[test]
    fn test_resolve_action() {
        let cli = Cli::parse_from(["bundlesync", "-vv", "resolve", "a.b", "--action", "add"]);
        assert_eq!(cli.verbose, 2);
        let Command::Resolve(args) = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(Action::from(args.action), Action::Add);
    }
}
