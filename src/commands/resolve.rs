use anyhow::{Context, Result};
use configsync::location::locate;
use configsync::{FieldPath, Resolved, pointer, resolve};

use crate::Context as AppContext;
use crate::cli::ResolveArgs;
use crate::ui;

/// Segments of `resources.<type>.<name>`
const RESOURCE_DEPTH: usize = 3;

pub fn run(_ctx: &AppContext, args: ResolveArgs) -> Result<()> {
    let (_, bundle) = super::load_bundle(&args.bundle)?;
    let path = FieldPath::parse(&args.field)
        .with_context(|| format!("Invalid field path '{}'", args.field))?;
    let resolved = resolve(&path, &bundle.tree, args.action.into())
        .with_context(|| format!("Could not resolve {}", args.field))?;

    ui::header(&args.field);
    ui::kv("Path", &resolved.path.to_string());
    ui::kv("Pointer", &describe_pointer(&resolved));
    if let Some(value) = bundle.tree.node(&path).to_value() {
        ui::kv("Value", &value.to_string());
    }
    if resolved.location.is_empty() {
        ui::kv("Declared", "not in source");
    } else {
        ui::kv("Declared", &resolved.location.to_string());
    }

    if path.len() > RESOURCE_DEPTH {
        let resource = path.prefix(RESOURCE_DEPTH);
        match locate(&bundle.tree, &resource, &resolved.location) {
            Ok(file) => ui::kv("File", &file),
            Err(err) => ui::warn(&err.to_string()),
        }
    }
    Ok(())
}

fn describe_pointer(resolved: &Resolved) -> String {
    if resolved.path.has_append() {
        format!("{} (appends a new element)", resolved.path)
    } else {
        pointer::to_pointer(&resolved.path).unwrap_or_else(|err| err.to_string())
    }
}
