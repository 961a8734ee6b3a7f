use anyhow::{Context, Result};
use configsync::{Changes, Diagnostic, DiagnosticSink, LogSink, Reconciler};
use std::fs;
use std::path::Path;

use crate::Context as AppContext;
use crate::cli::SyncArgs;
use crate::ui;

/// Forwards diagnostics to the log and counts the ones worth a warning.
#[derive(Default)]
struct Tally {
    warnings: usize,
}

impl DiagnosticSink for Tally {
    fn emit(&mut self, diagnostic: Diagnostic) {
        if diagnostic.level() <= log::Level::Warn {
            self.warnings += 1;
        }
        LogSink.emit(diagnostic);
    }
}

pub fn run(ctx: &AppContext, args: SyncArgs) -> Result<()> {
    let (settings, bundle) = super::load_bundle(&args.bundle)?;
    let changes = read_changes(&args.changes)?;
    let rules = settings.rules()?;

    let source = bundle.source();
    let mut tally = Tally::default();
    let file_changes = Reconciler::new(&bundle.tree)
        .with_rules(rules)
        .reconcile(&changes, &source, &mut tally)
        .context("Failed to write changes back")?;

    if file_changes.is_empty() {
        if !ctx.quiet {
            ui::info("Configuration already matches the change set");
        }
    } else {
        for change in &file_changes {
            if !ctx.quiet {
                ui::section(&change.path);
                ui::diff(&change.original_content, &change.modified_content);
            }
            if !args.dry_run {
                let path = source.resolve(&change.path);
                fs::write(&path, &change.modified_content)
                    .with_context(|| format!("Could not write {}", path.display()))?;
            }
        }

        if !ctx.quiet {
            println!();
            if args.dry_run {
                ui::info(&format!(
                    "Dry run: {} file(s) would change",
                    file_changes.len()
                ));
            } else {
                ui::success(&format!("Updated {} file(s)", file_changes.len()));
            }
        }
    }

    if tally.warnings > 0 {
        ui::warn(&format!(
            "{} change(s) could not be written back",
            tally.warnings
        ));
    }
    Ok(())
}

fn read_changes(path: &Path) -> Result<Changes> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid change set in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::DEFAULT_ROOT;
    use crate::cli::BundleArgs;
    use tempfile::TempDir;

    const ROOT: &str = "\
bundle:
  name: demo
include:
  - resources/*.yml
targets:
  dev:
    resources:
      jobs:
        etl:
          max_concurrent_runs: 2
";

    const JOB: &str = "\
resources:
  jobs:
    etl:
      name: etl # nightly
      timeout_seconds: 3600
      tasks:
        - task_key: ingest
        - task_key: main
          timeout_seconds: 600
";

    const CHANGES: &str = r#"{
  "resources.jobs.etl": {
    "timeout_seconds": {"action": "replace", "old": 3600, "remote": 7200},
    "tasks[task_key='main'].timeout_seconds": {"action": "remove", "old": 600},
    "max_concurrent_runs": {"action": "replace", "old": 2, "remote": 4},
    "id": {"action": "add", "remote": "123"}
  }
}"#;

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("resources")).unwrap();
        fs::write(dir.path().join(DEFAULT_ROOT), ROOT).unwrap();
        fs::write(dir.path().join("resources/job.yml"), JOB).unwrap();
        fs::write(dir.path().join("changes.json"), CHANGES).unwrap();
        dir
    }

    fn args(dir: &TempDir, dry_run: bool) -> SyncArgs {
        SyncArgs {
            changes: dir.path().join("changes.json"),
            bundle: BundleArgs {
                root: dir.path().join(DEFAULT_ROOT),
                target: Some("dev".to_string()),
                config: None,
            },
            dry_run,
        }
    }

    fn ctx() -> AppContext {
        AppContext {
            verbose: 0,
            quiet: true,
        }
    }

    #[test]
    fn test_sync_writes_files() {
        let dir = setup();
        run(&ctx(), args(&dir, false)).unwrap();

        let job = fs::read_to_string(dir.path().join("resources/job.yml")).unwrap();
        assert_eq!(
            job,
            "\
resources:
  jobs:
    etl:
      name: etl # nightly
      timeout_seconds: 7200
      tasks:
        - task_key: ingest
        - task_key: main
"
        );

        let root = fs::read_to_string(dir.path().join(DEFAULT_ROOT)).unwrap();
        assert_eq!(root, ROOT.replace("max_concurrent_runs: 2", "max_concurrent_runs: 4"));
    }

    #[test]
    fn test_dry_run_leaves_files() {
        let dir = setup();
        run(&ctx(), args(&dir, true)).unwrap();
        let job = fs::read_to_string(dir.path().join("resources/job.yml")).unwrap();
        assert_eq!(job, JOB);
    }

    #[test]
    fn test_invalid_change_set() {
        let dir = setup();
        fs::write(dir.path().join("changes.json"), "[1, 2]").unwrap();
        assert!(run(&ctx(), args(&dir, true)).is_err());
    }

    #[test]
    fn test_read_changes() {
        let dir = setup();
        let changes = read_changes(&dir.path().join("changes.json")).unwrap();
        assert_eq!(changes["resources.jobs.etl"].len(), 4);
        assert!(read_changes(&dir.path().join("missing.json")).is_err());
    }
}
