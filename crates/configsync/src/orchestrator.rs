//! Turning planner changes into file changes.
//!
//! Resources are handled one at a time in key order. A resource's fields are
//! resolved, paired, index-adjusted, located and encoded before anything is
//! staged, so a resource that cannot be placed leaves no trace. Staged edits
//! are then grouped per file and each file is patched once.

use crate::apply::apply_edits;
use crate::change::{Action, ChangeDescriptor, Changes, FieldEdit, FileChange, ResourceChanges};
use crate::defaults::DefaultRules;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::error::{Error, Result, Scope};
use crate::location::locate;
use crate::materialize::{self, materialize};
use crate::path::FieldPath;
use crate::pointer;
use crate::reconcile::{IndexLog, PendingEdit, adjust_batch, reuse_freed_slots};
use crate::resolve::resolve;
use crate::source::SourceFiles;
use crate::tree::ConfigTree;
use rayon::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Resource and field an edit came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub resource: String,
    pub field: String,
}

/// Edits staged for one file.
#[derive(Debug, Clone)]
pub struct FilePlan {
    pub path: String,
    pub original: String,
    pub edits: Vec<FieldEdit>,
    /// Parallel to `edits`
    pub origins: Vec<Origin>,
    mirror: Value,
}

impl FilePlan {
    fn load(files: &impl SourceFiles, path: &str) -> Result<Self> {
        let original = files.read(path)?;
        let document =
            yamlpatch::Document::parse(original.as_str()).map_err(|source| Error::Parse {
                path: path.to_string(),
                source,
            })?;
        Ok(Self {
            path: path.to_string(),
            mirror: document.to_value(),
            original,
            edits: Vec::new(),
            origins: Vec::new(),
        })
    }

    fn stage(&mut self, resource: &str, edit: &PendingEdit, target: Option<&str>) -> Result<()> {
        let field_edit = match (&edit.action, &edit.value) {
            (Action::Remove, _) => {
                let pointer = pointer::to_pointer(&edit.path)?;
                let removed = materialize::remove(&mut self.mirror, &edit.path)
                    || target.is_some_and(|t| {
                        materialize::remove(&mut self.mirror, &edit.path.under_target(t))
                    });
                if !removed {
                    log::trace!("{pointer} not present in {}", self.path);
                }
                FieldEdit::remove(pointer)
            }
            (_, value) => {
                let value = value.clone().unwrap_or(Value::Null);
                let placed = materialize(&mut self.mirror, &edit.path, target, value);
                if placed.created {
                    log::debug!("creating {} in {} for {}", placed.path, self.path, edit.path);
                }
                FieldEdit::set(pointer::to_pointer(&placed.path)?, placed.value)
            }
        };
        self.edits.push(field_edit);
        self.origins.push(Origin {
            resource: resource.to_string(),
            field: edit.field.clone(),
        });
        Ok(())
    }
}

/// An adjusted edit and the file it goes to.
struct LocatedEdit {
    file: String,
    edit: PendingEdit,
}

/// Writes planner changes back to source files.
pub struct Reconciler<'t> {
    tree: &'t ConfigTree,
    rules: DefaultRules,
}

impl<'t> Reconciler<'t> {
    /// Reconciler using the builtin default rules.
    pub fn new(tree: &'t ConfigTree) -> Self {
        Self {
            tree,
            rules: DefaultRules::builtin(),
        }
    }

    #[must_use]
    pub fn with_rules(mut self, rules: DefaultRules) -> Self {
        self.rules = rules;
        self
    }

    fn target(&self) -> Option<&'t str> {
        let target = self.tree.active_overlay_name();
        (!target.is_empty()).then_some(target)
    }

    /// Resolve and stage every change, grouped per file in path order.
    pub fn plan(
        &self,
        changes: &Changes,
        files: &impl SourceFiles,
        sink: &mut impl DiagnosticSink,
    ) -> Result<Vec<FilePlan>> {
        let target = self.target();
        let mut log = IndexLog::new();
        let mut plans: BTreeMap<String, FilePlan> = BTreeMap::new();

        for (resource, fields) in changes {
            let planned = FieldPath::parse(resource).and_then(|resource_path| {
                let edits = self.plan_resource(resource, &resource_path, fields, sink);
                let (edits, next_log) = adjust_batch(edits, log.clone());
                let located = self.locate_all(resource, &resource_path, edits, sink)?;
                Ok((located, next_log))
            });
            let located = match planned {
                Ok((located, next_log)) => {
                    log = next_log;
                    located
                }
                Err(err) => {
                    let kind = match err.scope() {
                        Scope::Run => return Err(err),
                        Scope::Resource => DiagnosticKind::LocationFailed,
                        Scope::Field => DiagnosticKind::ResolutionFailed,
                    };
                    sink.emit(Diagnostic::new(kind, resource, err.to_string()));
                    continue;
                }
            };

            for LocatedEdit { file, edit } in located {
                let plan = match plans.entry(file) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        let plan = FilePlan::load(files, entry.key())?;
                        entry.insert(plan)
                    }
                };
                if let Err(err) = plan.stage(resource, &edit, target) {
                    sink.emit(
                        Diagnostic::new(DiagnosticKind::ResolutionFailed, resource, err.to_string())
                            .with_field(&edit.field),
                    );
                }
            }
        }

        Ok(plans.into_values().collect())
    }

    /// Plan and apply `changes`, returning one change per file that had at
    /// least one edit applied.
    pub fn reconcile(
        &self,
        changes: &Changes,
        files: &impl SourceFiles,
        sink: &mut impl DiagnosticSink,
    ) -> Result<Vec<FileChange>> {
        let plans = self.plan(changes, files, sink)?;
        let target = self.target();

        let results: Vec<_> = plans
            .into_par_iter()
            .map(|plan| {
                let applied = apply_edits(&plan.original, &plan.edits, target);
                (plan, applied)
            })
            .collect();

        let mut file_changes = Vec::new();
        for (plan, applied) in results {
            let applied = applied.map_err(|source| Error::Parse {
                path: plan.path.clone(),
                source,
            })?;
            for dropped in &applied.dropped {
                let origin = &plan.origins[dropped.index];
                sink.emit(
                    Diagnostic::new(
                        DiagnosticKind::EditDropped,
                        &origin.resource,
                        format!("{} in {}: {}", dropped.pointer, plan.path, dropped.reason),
                    )
                    .with_field(&origin.field),
                );
            }
            if applied.ops.is_empty() {
                continue;
            }
            log::debug!("{}: {} edit(s) applied", plan.path, applied.ops.len());
            file_changes.push(FileChange {
                path: plan.path,
                original_content: plan.original,
                modified_content: applied.content,
            });
        }
        Ok(file_changes)
    }

    fn plan_resource(
        &self,
        resource: &str,
        resource_path: &FieldPath,
        fields: &ResourceChanges,
        sink: &mut impl DiagnosticSink,
    ) -> Vec<PendingEdit> {
        let mut ordered = Vec::with_capacity(fields.len());
        for (field, change) in fields {
            match FieldPath::parse(field) {
                Ok(path) => ordered.push((resource_path.join(&path), field, change)),
                Err(err) => sink.emit(
                    Diagnostic::new(DiagnosticKind::ResolutionFailed, resource, err.to_string())
                        .with_field(field),
                ),
            }
        }
        // Deepest first, then removes, then by field text.
        ordered.sort_by(|(a, a_field, a_change), (b, b_field, b_change)| {
            b.len()
                .cmp(&a.len())
                .then(a_change.action.rank().cmp(&b_change.action.rank()))
                .then(a_field.cmp(b_field))
        });

        let mut edits: Vec<PendingEdit> = ordered
            .into_iter()
            .filter_map(|(path, field, change)| self.plan_field(resource, field, path, change, sink))
            .collect();

        for reuse in reuse_freed_slots(&mut edits) {
            sink.emit(
                Diagnostic::new(
                    DiagnosticKind::SlotReused,
                    resource,
                    format!("takes index {} freed by {}", reuse.index, reuse.removed),
                )
                .with_field(reuse.added),
            );
        }
        edits
    }

    fn plan_field(
        &self,
        resource: &str,
        field: &str,
        path: FieldPath,
        change: &ChangeDescriptor,
        sink: &mut impl DiagnosticSink,
    ) -> Option<PendingEdit> {
        let report = |kind: DiagnosticKind, message: String| {
            Diagnostic::new(kind, resource, message).with_field(field)
        };

        if change.action == Action::Skip {
            sink.emit(report(DiagnosticKind::Skipped, "skipped by planner".into()));
            return None;
        }

        let resolved = match resolve(&path, self.tree, change.action) {
            Ok(resolved) => resolved,
            Err(err) => {
                sink.emit(report(DiagnosticKind::ResolutionFailed, err.to_string()));
                return None;
            }
        };

        let mut action = change.action;
        let mut value = change.remote_value.clone();
        if resolved.location.is_empty() {
            match action {
                Action::Remove => {
                    sink.emit(report(
                        DiagnosticKind::DroppedNoProvenance,
                        "not declared in any source file".into(),
                    ));
                    return None;
                }
                Action::Replace => {
                    sink.emit(report(
                        DiagnosticKind::ReclassifiedAsAdd,
                        "not declared in any source file, adding it".into(),
                    ));
                    action = Action::Add;
                }
                Action::Add | Action::Skip => {}
            }
        }

        if action == Action::Add && self.rules.should_skip(&path, value.as_ref()) {
            let shown = value.as_ref().map_or_else(|| "absent".to_string(), Value::to_string);
            sink.emit(report(
                DiagnosticKind::DefaultSuppressed,
                format!("{shown} is a platform default"),
            ));
            return None;
        }

        let cleared = action == Action::Remove
            || (action == Action::Replace && value.as_ref().is_none_or(Value::is_null));
        if cleared && let Some(reset) = self.rules.reset_value(&path) {
            sink.emit(report(
                DiagnosticKind::ResetValue,
                format!("writing {reset} instead of clearing"),
            ));
            action = Action::Replace;
            value = Some(reset.clone());
        }

        Some(PendingEdit {
            field: field.to_string(),
            source: path,
            path: resolved.path,
            action,
            value: if action == Action::Remove { None } else { value },
            location: resolved.location,
        })
    }

    fn locate_all(
        &self,
        resource: &str,
        resource_path: &FieldPath,
        edits: Vec<PendingEdit>,
        sink: &mut impl DiagnosticSink,
    ) -> Result<Vec<LocatedEdit>> {
        let mut located = Vec::with_capacity(edits.len());
        for edit in edits {
            let file = locate(self.tree, resource_path, &edit.location)?;
            if let Err(err) = pointer::to_pointer(&edit.path) {
                sink.emit(
                    Diagnostic::new(DiagnosticKind::ResolutionFailed, resource, err.to_string())
                        .with_field(&edit.field),
                );
                continue;
            }
            log::trace!("{resource}.{} -> {file} {}", edit.field, edit.path);
            located.push(LocatedEdit { file, edit });
        }
        Ok(located)
    }
}

/// Reconcile `changes` against `tree` with the builtin default rules.
pub fn reconcile(
    changes: &Changes,
    tree: &ConfigTree,
    files: &impl SourceFiles,
    sink: &mut impl DiagnosticSink,
) -> Result<Vec<FileChange>> {
    Reconciler::new(tree).reconcile(changes, files, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::EditOp;
    use crate::defaults::{Comparison, DefaultRule, Pattern};
    use crate::diagnostics::CollectingSink;
    use crate::source::MemorySource;
    use crate::tree::Node;
    use serde_json::json;
    use yamlpatch::Document;

    const BUNDLE: &str = "\
bundle:
  name: demo

include:
  - resources/*.yml

targets:
  dev:
    default: true
    resources:
      jobs:
        job1:
          max_concurrent_runs: 2
  prod:
    mode: production
";

    const JOB: &str = "\
resources:
  jobs:
    job1:
      name: etl # nightly load
      timeout_seconds: 3600
      tasks:
        - task_key: ingest
          notebook_task:
            notebook_path: ./ingest.py
        - task_key: main
          timeout_seconds: 600
          notebook_task:
            notebook_path: ./main.py
";

    fn load(files: &[(&str, &str)], target: &str) -> (ConfigTree, MemorySource) {
        let mut source = MemorySource::new();
        let mut root = Node::Absent;
        for (path, content) in files {
            source.insert(*path, *content);
            root.merge(Node::from_document(path, &Document::parse(*content).unwrap()));
        }
        if !target.is_empty() {
            root.apply_target(target);
        }
        (ConfigTree::new(root).with_target(target), source)
    }

    fn bundle(target: &str) -> (ConfigTree, MemorySource) {
        load(
            &[("databricks.yml", BUNDLE), ("resources/job.yml", JOB)],
            target,
        )
    }

    fn job1(fields: Vec<(&str, ChangeDescriptor)>) -> Changes {
        let fields = fields
            .into_iter()
            .map(|(field, change)| (field.to_string(), change))
            .collect();
        BTreeMap::from([("resources.jobs.job1".to_string(), fields)])
    }

    fn run(changes: &Changes, target: &str) -> (Vec<FileChange>, CollectingSink) {
        let (tree, source) = bundle(target);
        let mut sink = CollectingSink::new();
        let result = reconcile(changes, &tree, &source, &mut sink).unwrap();
        (result, sink)
    }

    fn single(changes: &[FileChange]) -> &FileChange {
        assert_eq!(changes.len(), 1, "expected one file change: {changes:?}");
        &changes[0]
    }

    #[test]
    fn test_simple_replace() {
        let changes = job1(vec![(
            "timeout_seconds",
            ChangeDescriptor::replace(json!(3600), json!(7200)),
        )]);
        let (result, sink) = run(&changes, "");
        let change = single(&result);

        assert_eq!(change.path, "resources/job.yml");
        assert_eq!(change.original_content, JOB);
        let before: Vec<_> = JOB.lines().collect();
        let after: Vec<_> = change.modified_content.lines().collect();
        assert_eq!(before.len(), after.len());
        for (i, (old, new)) in before.iter().zip(&after).enumerate() {
            if i == 4 {
                assert_eq!(*new, "      timeout_seconds: 7200");
            } else {
                assert_eq!(old, new);
            }
        }
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn test_array_selector_uses_file_order() {
        let (mut tree, source) = bundle("");
        // Loaders may hand elements over in a different order.
        let mut root = tree.root().clone();
        if let Node::Sequence { items, .. } = node_mut(&mut root, &["resources", "jobs", "job1", "tasks"]) {
            items.reverse();
        }
        tree = ConfigTree::new(root);

        let changes = job1(vec![(
            "tasks[task_key='main'].timeout_seconds",
            ChangeDescriptor::replace(json!(600), json!(1200)),
        )]);
        let mut sink = CollectingSink::new();
        let plans = Reconciler::new(&tree).plan(&changes, &source, &mut sink).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(
            plans[0].edits,
            vec![FieldEdit::set(
                "/resources/jobs/job1/tasks/1/timeout_seconds",
                json!(1200)
            )]
        );

        let result = Reconciler::new(&tree).reconcile(&changes, &source, &mut sink).unwrap();
        assert_eq!(
            single(&result).modified_content,
            JOB.replace("timeout_seconds: 600", "timeout_seconds: 1200")
        );
    }

    fn node_mut<'n>(node: &'n mut Node, keys: &[&str]) -> &'n mut Node {
        keys.iter().fold(node, |node, key| match node {
            Node::Map { entries, .. } => {
                &mut entries
                    .iter_mut()
                    .find(|(k, _)| k == key)
                    .expect("key exists")
                    .1
            }
            _ => panic!("{key} is not under a mapping"),
        })
    }

    #[test]
    fn test_missing_field_upgraded_to_add() {
        let changes = job1(vec![(
            "max_retries",
            ChangeDescriptor::replace(json!(1), json!(3)),
        )]);
        let (result, sink) = run(&changes, "");
        let change = single(&result);

        assert_eq!(change.path, "resources/job.yml");
        assert_eq!(change.modified_content, format!("{JOB}      max_retries: 3\n"));
        assert_eq!(sink.of_kind(DiagnosticKind::ReclassifiedAsAdd).len(), 1);
    }

    #[test]
    fn test_overlay_fallback() {
        let changes = job1(vec![(
            "max_concurrent_runs",
            ChangeDescriptor::replace(json!(2), json!(5)),
        )]);
        let (result, _) = run(&changes, "dev");
        let change = single(&result);

        assert_eq!(change.path, "databricks.yml");
        assert_eq!(
            change.modified_content,
            BUNDLE.replace("max_concurrent_runs: 2", "max_concurrent_runs: 5")
        );
    }

    #[test]
    fn test_add_lands_in_overlay_declaration() {
        let changes = job1(vec![("max_retries", ChangeDescriptor::add(json!(3)))]);
        let (result, _) = run(&changes, "dev");
        let change = single(&result);

        assert_eq!(change.path, "databricks.yml");
        assert!(change.modified_content.contains(
            "          max_concurrent_runs: 2\n          max_retries: 3\n"
        ));
    }

    #[test]
    fn test_default_suppression() {
        let changes = job1(vec![
            ("queue", ChangeDescriptor::add(json!({"enabled": true}))),
            ("edit_mode", ChangeDescriptor::add(json!("UI_LOCKED"))),
            ("tasks[task_key='main'].run_if", ChangeDescriptor::add(json!("ALL_SUCCESS"))),
        ]);
        let (result, sink) = run(&changes, "");
        assert!(result.is_empty());
        assert_eq!(sink.of_kind(DiagnosticKind::DefaultSuppressed).len(), 3);
    }

    #[test]
    fn test_user_rules_take_priority() {
        let (tree, source) = bundle("");
        let rules = DefaultRules::builtin().with_overrides(vec![DefaultRule {
            pattern: Pattern::parse("resources.jobs.*.tags").unwrap(),
            comparison: Comparison::Always,
        }]);
        let changes = job1(vec![("tags", ChangeDescriptor::add(json!({"team": "data"})))]);
        let mut sink = CollectingSink::new();
        let result = Reconciler::new(&tree)
            .with_rules(rules)
            .reconcile(&changes, &source, &mut sink)
            .unwrap();
        assert!(result.is_empty());

        let result = Reconciler::new(&tree)
            .with_rules(DefaultRules::empty())
            .reconcile(&changes, &source, &mut sink)
            .unwrap();
        assert!(single(&result).modified_content.contains("      tags:\n        team: data\n"));
    }

    #[test]
    fn test_remove_without_provenance_is_dropped() {
        let changes = job1(vec![(
            "deployment",
            ChangeDescriptor::remove(json!({"kind": "BUNDLE"})),
        )]);
        let (result, sink) = run(&changes, "");
        assert!(result.is_empty());
        assert_eq!(sink.of_kind(DiagnosticKind::DroppedNoProvenance).len(), 1);
    }

    #[test]
    fn test_skip_is_reported() {
        let changes = job1(vec![("name", ChangeDescriptor::skip())]);
        let (result, sink) = run(&changes, "");
        assert!(result.is_empty());
        assert_eq!(sink.of_kind(DiagnosticKind::Skipped).len(), 1);
    }

    #[test]
    fn test_nested_edit_sees_original_indices() {
        let changes = job1(vec![
            (
                "tasks[task_key='ingest']",
                ChangeDescriptor::remove(json!({"task_key": "ingest"})),
            ),
            (
                "tasks[task_key='main'].timeout_seconds",
                ChangeDescriptor::replace(json!(600), json!(900)),
            ),
        ]);
        let (result, _) = run(&changes, "");
        let content = &single(&result).modified_content;
        assert!(!content.contains("ingest"));
        assert!(content.contains("        - task_key: main\n          timeout_seconds: 900\n"));
    }

    #[test]
    fn test_removals_shift_later_indices() {
        let changes = job1(vec![
            (
                "tasks[task_key='ingest']",
                ChangeDescriptor::remove(json!({"task_key": "ingest"})),
            ),
            (
                "tasks[task_key='main']",
                ChangeDescriptor::remove(json!({"task_key": "main"})),
            ),
        ]);
        let (result, sink) = run(&changes, "");
        let content = &single(&result).modified_content;
        assert!(content.contains("      tasks: []\n"), "{content}");
        assert_eq!(sink.warnings(), 0);
    }

    #[test]
    fn test_renamed_element_reuses_its_slot() {
        let changes = job1(vec![
            (
                "tasks[task_key='ingest']",
                ChangeDescriptor::remove(json!({"task_key": "ingest"})),
            ),
            (
                "tasks[task_key='load']",
                ChangeDescriptor::add(json!({"task_key": "load"})),
            ),
        ]);
        let (result, sink) = run(&changes, "");
        let content = &single(&result).modified_content;
        let load = content.find("task_key: load").expect("load added");
        let main = content.find("task_key: main").expect("main kept");
        assert!(load < main);
        assert!(!content.contains("ingest"));
        assert_eq!(sink.of_kind(DiagnosticKind::SlotReused).len(), 1);
    }

    #[test]
    fn test_new_elements_append_in_order() {
        let changes = job1(vec![
            ("tasks[task_key='a']", ChangeDescriptor::add(json!({"task_key": "a"}))),
            ("tasks[task_key='b']", ChangeDescriptor::add(json!({"task_key": "b"}))),
        ]);
        let (result, _) = run(&changes, "");
        let content = &single(&result).modified_content;
        assert!(content.ends_with(
            "            notebook_path: ./main.py\n        - task_key: a\n        - task_key: b\n"
        ));
    }

    #[test]
    fn test_missing_parents_are_created() {
        let changes = job1(vec![
            (
                "email_notifications.on_failure",
                ChangeDescriptor::add(json!(["ops@example.com"])),
            ),
            (
                "email_notifications.on_success",
                ChangeDescriptor::add(json!(["team@example.com"])),
            ),
        ]);
        let (tree, source) = bundle("");
        let mut sink = CollectingSink::new();
        let plans = Reconciler::new(&tree).plan(&changes, &source, &mut sink).unwrap();
        assert_eq!(plans[0].edits[0].pointer, "/resources/jobs/job1/email_notifications");
        assert_eq!(
            plans[0].edits[0].op,
            EditOp::Set(json!({"on_failure": ["ops@example.com"]}))
        );
        assert_eq!(
            plans[0].edits[1].pointer,
            "/resources/jobs/job1/email_notifications/on_success"
        );

        let result = Reconciler::new(&tree).reconcile(&changes, &source, &mut sink).unwrap();
        let content = &single(&result).modified_content;
        assert!(content.contains("      email_notifications:\n        on_failure:\n"));
        assert!(content.contains("        on_success:\n          - team@example.com\n"));
    }

    #[test]
    fn test_reset_value_replaces_removal() {
        let cluster = "\
resources:
  clusters:
    shared:
      num_workers: 2
      autotermination_minutes: 60
";
        let (tree, source) = load(&[("cluster.yml", cluster)], "");
        let changes = BTreeMap::from([(
            "resources.clusters.shared".to_string(),
            BTreeMap::from([(
                "autotermination_minutes".to_string(),
                ChangeDescriptor::remove(json!(60)),
            )]),
        )]);
        let mut sink = CollectingSink::new();
        let result = reconcile(&changes, &tree, &source, &mut sink).unwrap();
        assert_eq!(
            single(&result).modified_content,
            cluster.replace("autotermination_minutes: 60", "autotermination_minutes: 0")
        );
        assert_eq!(sink.of_kind(DiagnosticKind::ResetValue).len(), 1);
    }

    #[test]
    fn test_resolution_failure_skips_only_that_field() {
        let changes = job1(vec![
            (
                "tasks[task_key='missing'].timeout_seconds",
                ChangeDescriptor::replace(json!(1), json!(2)),
            ),
            ("name", ChangeDescriptor::replace(json!("etl"), json!("elt"))),
        ]);
        let (result, sink) = run(&changes, "");
        assert!(single(&result).modified_content.contains("name: elt # nightly load"));
        let failures = sink.of_kind(DiagnosticKind::ResolutionFailed);
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].field.as_deref(),
            Some("tasks[task_key='missing'].timeout_seconds")
        );
    }

    #[test]
    fn test_location_failure_skips_only_that_resource() {
        let mut changes = job1(vec![(
            "timeout_seconds",
            ChangeDescriptor::replace(json!(3600), json!(60)),
        )]);
        changes.insert(
            "resources.jobs.ghost".to_string(),
            BTreeMap::from([("name".to_string(), ChangeDescriptor::add(json!("ghost")))]),
        );
        let (result, sink) = run(&changes, "");
        assert!(single(&result).modified_content.contains("timeout_seconds: 60\n"));
        let failures = sink.of_kind(DiagnosticKind::LocationFailed);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].resource, "resources.jobs.ghost");
    }

    const FLOW_JOB: &str = "\
resources:
  jobs:
    job2:
      tags: {team: data, env: dev} # owners
      depends: [a, b]
      tasks: []
      libraries:
";

    fn run_flow(fields: Vec<(&str, ChangeDescriptor)>) -> (Vec<FileChange>, CollectingSink) {
        let (tree, source) = load(&[("resources/flow.yml", FLOW_JOB)], "");
        let fields = fields
            .into_iter()
            .map(|(field, change)| (field.to_string(), change))
            .collect();
        let changes = BTreeMap::from([("resources.jobs.job2".to_string(), fields)]);
        let mut sink = CollectingSink::new();
        let result = reconcile(&changes, &tree, &source, &mut sink).unwrap();
        (result, sink)
    }

    #[test]
    fn test_remove_inside_flow_collections() {
        let (result, sink) = run_flow(vec![
            ("tags.team", ChangeDescriptor::remove(json!("data"))),
            ("depends[1]", ChangeDescriptor::remove(json!("b"))),
        ]);
        let expected = FLOW_JOB
            .replace("{team: data, env: dev}", "{env: dev}")
            .replace("[a, b]", "[a]");
        assert_eq!(single(&result).modified_content, expected);
        assert!(sink.of_kind(DiagnosticKind::DroppedNoProvenance).is_empty());
    }

    #[test]
    fn test_replace_inside_flow_collections() {
        let (result, sink) = run_flow(vec![
            ("tags.team", ChangeDescriptor::replace(json!("data"), json!("ml"))),
            ("depends[0]", ChangeDescriptor::replace(json!("a"), json!("z"))),
        ]);
        let expected = FLOW_JOB
            .replace("{team: data, env: dev} # owners", "{team: ml, env: dev} # owners")
            .replace("[a, b]", "[z, b]");
        assert_eq!(single(&result).modified_content, expected);
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn test_add_element_into_empty_flow_sequence() {
        let (result, sink) = run_flow(vec![(
            "tasks[task_key='new']",
            ChangeDescriptor::add(json!({"task_key": "new"})),
        )]);
        let content = &single(&result).modified_content;
        assert!(content.contains("      tasks: [{task_key: new}]\n"), "{content}");
        assert!(sink.of_kind(DiagnosticKind::ResolutionFailed).is_empty());
    }

    #[test]
    fn test_add_element_under_empty_key() {
        let (result, sink) = run_flow(vec![(
            "libraries[whl='x.whl']",
            ChangeDescriptor::add(json!({"whl": "x.whl"})),
        )]);
        let content = &single(&result).modified_content;
        assert!(
            content.ends_with("      libraries:\n        - whl: x.whl\n"),
            "{content}"
        );
        assert!(sink.of_kind(DiagnosticKind::ResolutionFailed).is_empty());
    }

    #[test]
    fn test_malformed_resource_key_is_reported() {
        let mut changes = job1(vec![(
            "timeout_seconds",
            ChangeDescriptor::replace(json!(3600), json!(60)),
        )]);
        changes.insert(
            "resources..broken".to_string(),
            BTreeMap::from([("name".to_string(), ChangeDescriptor::add(json!("x")))]),
        );
        let (result, sink) = run(&changes, "");
        assert!(single(&result).modified_content.contains("timeout_seconds: 60\n"));
        let failures = sink.of_kind(DiagnosticKind::ResolutionFailed);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].resource, "resources..broken");
        assert_eq!(failures[0].field, None);
    }

    #[test]
    fn test_unpatchable_edit_is_dropped_with_warning() {
        let changes = job1(vec![("name.display", ChangeDescriptor::add(json!("x")))]);
        let (result, sink) = run(&changes, "");
        assert!(result.is_empty());
        let dropped = sink.of_kind(DiagnosticKind::EditDropped);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].field.as_deref(), Some("name.display"));
    }

    #[test]
    fn test_unreadable_file_fails_the_run() {
        let (tree, _) = bundle("");
        let changes = job1(vec![(
            "timeout_seconds",
            ChangeDescriptor::replace(json!(3600), json!(60)),
        )]);
        let err = reconcile(&changes, &tree, &MemorySource::new(), &mut CollectingSink::new())
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_edits_across_files() {
        let changes = BTreeMap::from([
            (
                "bundle".to_string(),
                BTreeMap::from([(
                    "name".to_string(),
                    ChangeDescriptor::replace(json!("demo"), json!("demo2")),
                )]),
            ),
            (
                "resources.jobs.job1".to_string(),
                BTreeMap::from([(
                    "timeout_seconds".to_string(),
                    ChangeDescriptor::replace(json!(3600), json!(60)),
                )]),
            ),
        ]);
        let (result, _) = run(&changes, "");
        let paths: Vec<_> = result.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["databricks.yml", "resources/job.yml"]);
        assert!(result[0].modified_content.contains("  name: demo2\n"));
    }
}
