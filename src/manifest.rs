//! `requirements.txt` reading and rewriting.

use crate::errors::PruneError;
use crate::metadata::normalize_name;
use crate::pip::requirement_name;
use crate::reconcile::is_referenced_by_name;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "requirements.txt";

pub fn manifest_path(project_root: &Path) -> PathBuf {
    project_root.join(MANIFEST_FILE)
}

/// Outcome of rewriting the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestUpdate {
    /// No manifest existed; nothing was written
    Missing,
    Rewritten { path: PathBuf, removed: Vec<String> },
}

/// Drops lines naming an unused package, keeping every other line verbatim.
///
/// Names are compared normalized, so `typing-extensions` and `Typing_Extensions`
/// name the same package. Lines whose package is in `used_names` are always
/// kept. Returns the new content and the names of the dropped packages in
/// file order.
pub fn filter_requirements(
    content: &str,
    unused: &BTreeSet<String>,
    used_names: &BTreeSet<String>,
) -> (String, Vec<String>) {
    let unused: BTreeSet<String> = unused.iter().map(|name| normalize_name(name)).collect();
    let mut kept = String::with_capacity(content.len());
    let mut removed = Vec::new();

    for line in content.split_inclusive('\n') {
        match requirement_name(line) {
            Some(name)
                if unused.contains(&normalize_name(&name))
                    && !is_referenced_by_name(&name, used_names) =>
            {
                removed.push(name);
            }
            _ => kept.push_str(line),
        }
    }

    (kept, removed)
}

/// Rewrites `requirements.txt` under `project_root` without the unused packages.
pub fn remove_from_requirements(
    project_root: &Path,
    unused: &BTreeSet<String>,
    used_names: &BTreeSet<String>,
) -> Result<ManifestUpdate, PruneError> {
    let path = manifest_path(project_root);
    if !path.exists() {
        return Ok(ManifestUpdate::Missing);
    }

    let content = fs::read_to_string(&path).map_err(|e| PruneError::io(&path, e))?;
    let (filtered, removed) = filter_requirements(&content, unused, used_names);
    fs::write(&path, filtered).map_err(|e| PruneError::io(&path, e))?;

    Ok(ManifestUpdate::Rewritten { path, removed })
}

/// Overwrites `requirements.txt` with `content`, verbatim.
pub fn write_requirements(project_root: &Path, content: &str) -> Result<PathBuf, PruneError> {
    let path = manifest_path(project_root);
    fs::write(&path, content).map_err(|e| PruneError::io(&path, e))?;
    Ok(path)
}
