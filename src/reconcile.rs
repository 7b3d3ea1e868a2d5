use crate::metadata::{ImportNameTable, normalize_name};
use std::collections::BTreeSet;

/// Installed distributions none of whose import names are used.
///
/// `kept` holds normalized names that are never reported. The result is sorted
/// ascending and has no duplicates.
pub fn find_unused(
    table: &ImportNameTable,
    used_names: &BTreeSet<String>,
    kept: &BTreeSet<String>,
) -> Vec<String> {
    table
        .iter()
        .filter(|(package, _)| !kept.contains(&normalize_name(package)))
        .filter(|(_, names)| names.is_disjoint(used_names))
        .map(|(package, _)| package.clone())
        .collect()
}

/// Unused packages that are safe to delete.
///
/// A package whose own name is imported somewhere is held back even when its
/// resolved import names are not, so a name collision never removes something
/// the project references.
pub fn removal_candidates(unused: &[String], used_names: &BTreeSet<String>) -> Vec<String> {
    unused
        .iter()
        .filter(|package| !is_referenced_by_name(package, used_names))
        .cloned()
        .collect()
}

/// True when `package` itself appears as an import name.
pub fn is_referenced_by_name(package: &str, used_names: &BTreeSet<String>) -> bool {
    let lowered = package.to_lowercase();
    used_names.contains(&lowered) || used_names.contains(&lowered.replace('-', "_"))
}
