//! Choice of the file that receives an edit.

use crate::error::{Error, Result};
use crate::path::FieldPath;
use crate::tree::{ConfigTree, Location};

/// File that should receive an edit of `resource`.
///
/// A field declared in source stays in its own file. Otherwise the edit goes
/// to the active target's declaration of the resource, then to its base
/// declaration.
pub fn locate(tree: &ConfigTree, resource: &FieldPath, field: &Location) -> Result<String> {
    if !field.is_empty() {
        return Ok(field.file.clone());
    }

    let target = tree.active_overlay_name();
    if !target.is_empty() {
        let overlay = tree.node(&resource.under_target(target)).location();
        if !overlay.is_empty() {
            log::trace!("{resource} located through target {target} at {overlay}");
            return Ok(overlay.file.clone());
        }
    }

    let base = tree.node(resource).location();
    if base.is_empty() {
        return Err(Error::NoSourceFile {
            resource: resource.to_string(),
        });
    }
    Ok(base.file.clone())
}
