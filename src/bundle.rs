//! Loading a bundle from disk into a location-annotated tree.
//!
//! The root file is read first, then every file its `include:` list names,
//! in list order. Include entries are relative to the root file's directory
//! and may use `*` (any run of characters within one path component) and
//! `**` (any number of directories).

use anyhow::{Context, Result, bail};
use configsync::{ConfigTree, FsSource, Node};
use globset::{GlobBuilder, GlobMatcher};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use yamlpatch::Document;

/// Root file name used when none is given.
pub const DEFAULT_ROOT: &str = "databricks.yml";

pub struct Bundle {
    /// Directory every source path is relative to
    pub dir: PathBuf,
    /// Loaded files in merge order, root first
    pub files: Vec<String>,
    pub tree: ConfigTree,
}

impl Bundle {
    /// Load the bundle rooted at `root`, activating `target` when given.
    pub fn load(root: &Path, target: Option<&str>) -> Result<Self> {
        let dir = root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let root_name = root
            .file_name()
            .with_context(|| format!("{} is not a file", root.display()))?
            .to_string_lossy()
            .into_owned();

        let root_doc = parse_file(&dir, &root_name)?;
        let mut node = Node::from_document(&root_name, &root_doc);
        let mut files = vec![root_name.clone()];

        for pattern in include_patterns(&root_doc, &root_name)? {
            for file in expand(&dir, &pattern)? {
                if files.contains(&file) {
                    continue;
                }
                let document = parse_file(&dir, &file)?;
                node.merge(Node::from_document(&file, &document));
                log::debug!("Included {file}");
                files.push(file);
            }
        }

        let target = target.filter(|t| !t.is_empty());
        if let Some(target) = target {
            if node.get("targets").get(target).is_absent() {
                bail!("Target '{target}' is not defined in {root_name}");
            }
            node.apply_target(target);
        }

        let tree = ConfigTree::new(node).with_target(target.unwrap_or_default());
        Ok(Self { dir, files, tree })
    }

    /// File provider rooted at the bundle directory.
    pub fn source(&self) -> FsSource {
        FsSource::with_base(&self.dir)
    }
}

fn parse_file(dir: &Path, file: &str) -> Result<Document> {
    let path = dir.join(file);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    Document::parse(content).with_context(|| format!("Could not parse {file}"))
}

fn include_patterns(document: &Document, file: &str) -> Result<Vec<String>> {
    match document.to_value().get("include") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(normalize(s)),
                other => bail!("Include entries in {file} must be strings, found {other}"),
            })
            .collect(),
        Some(other) => bail!("'include' in {file} must be a list, found {other}"),
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches("./").to_string()
}

/// Files under `dir` matched by `pattern`, sorted. A pattern without
/// wildcards names exactly one file.
fn expand(dir: &Path, pattern: &str) -> Result<Vec<String>> {
    if !pattern.contains('*') {
        return Ok(vec![pattern.to_string()]);
    }
    let matcher = glob_matcher(pattern)?;
    let mut matched: Vec<String> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| relative(dir, e.path()))
        .filter(|rel| matcher.is_match(rel))
        .collect();
    matched.sort();
    if matched.is_empty() {
        log::warn!("Include pattern '{pattern}' matched no files");
    }
    Ok(matched)
}

fn relative(dir: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(dir).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

fn glob_matcher(pattern: &str) -> Result<GlobMatcher> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("Invalid include pattern '{pattern}'"))?
        .compile_matcher())
}
