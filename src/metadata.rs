//! Distribution name -> import name resolution.
//!
//! Installed distributions do not always import under their published name
//! (`Pillow` is imported as `PIL`). The mapping is read from the environment's
//! `site-packages` metadata: when a distribution's file manifest lists a
//! `top_level.txt`, its lines are the import names; otherwise the distribution
//! name itself is used.

use crate::errors::PruneError;
use crate::venv::VirtualEnv;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const TOP_LEVEL_FILE: &str = "top_level.txt";

/// Source of per-distribution top-level module declarations.
pub trait MetadataSource {
    /// Import names declared by `package`.
    ///
    /// `Ok(None)` means the metadata was found but declares no top-level modules.
    fn top_level_names(&self, package: &str) -> Result<Option<Vec<String>>, PruneError>;
}

/// Normalizes a distribution name for comparison (`Typing_Extensions` ->
/// `typing-extensions`).
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut pending_separator = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            pending_separator = true;
        } else {
            if pending_separator && !normalized.is_empty() {
                normalized.push('-');
            }
            pending_separator = false;
            normalized.extend(c.to_lowercase());
        }
    }
    normalized
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetadataKind {
    DistInfo,
    EggInfo,
}

impl MetadataKind {
    fn manifest_file(self) -> &'static str {
        match self {
            MetadataKind::DistInfo => "RECORD",
            MetadataKind::EggInfo => "installed-files.txt",
        }
    }
}

#[derive(Debug, Clone)]
struct MetadataDir {
    path: PathBuf,
    kind: MetadataKind,
}

/// Installed-package metadata found under one or more `site-packages` directories.
#[derive(Debug, Default)]
pub struct SitePackages {
    dirs: BTreeMap<String, MetadataDir>,
}

/// `site-packages` directories of an environment.
pub fn site_packages_dirs(venv_root: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    let windows_dir = venv_root.join("Lib").join("site-packages");
    if windows_dir.is_dir() {
        dirs.push(windows_dir);
    }

    for lib in ["lib", "lib64"] {
        let Ok(entries) = fs::read_dir(venv_root.join(lib)) else {
            continue;
        };
        let mut found: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path().join("site-packages"))
            .filter(|path| path.is_dir())
            .collect();
        found.sort();
        for path in found {
            if !dirs.contains(&path) {
                dirs.push(path);
            }
        }
    }

    dirs
}

/// Splits a metadata directory name into (distribution name, kind).
fn parse_metadata_dir_name(file_name: &str) -> Option<(String, MetadataKind)> {
    let (stem, kind) = if let Some(stem) = file_name.strip_suffix(".dist-info") {
        (stem, MetadataKind::DistInfo)
    } else if let Some(stem) = file_name.strip_suffix(".egg-info") {
        (stem, MetadataKind::EggInfo)
    } else {
        return None;
    };

    // Escaped distribution names never contain '-', so the first one starts the version.
    let name = stem.split('-').next().unwrap_or(stem);
    if name.is_empty() {
        None
    } else {
        Some((normalize_name(name), kind))
    }
}

impl SitePackages {
    /// Indexes metadata directories of the given environment.
    pub fn for_env(venv: &VirtualEnv) -> Self {
        let dirs = site_packages_dirs(&venv.root);
        if dirs.is_empty() {
            warn!(
                "No site-packages directory found under {}",
                venv.root.display()
            );
        }
        Self::from_dirs(&dirs)
    }

    pub fn from_dirs(site_dirs: &[PathBuf]) -> Self {
        let mut dirs = BTreeMap::new();

        for site_dir in site_dirs {
            let Ok(entries) = fs::read_dir(site_dir) else {
                warn!("Cannot read {}", site_dir.display());
                continue;
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if let Some((name, kind)) = parse_metadata_dir_name(file_name) {
                    // First site dir wins, dist-info over egg-info
                    let replace = match dirs.get(&name) {
                        None => true,
                        Some(MetadataDir { kind: existing, .. }) => {
                            *existing == MetadataKind::EggInfo && kind == MetadataKind::DistInfo
                        }
                    };
                    if replace {
                        dirs.insert(name, MetadataDir { path, kind });
                    }
                }
            }
        }

        debug!("Indexed metadata for {} distributions", dirs.len());
        Self { dirs }
    }

    fn manifest_lists_top_level(dir: &MetadataDir, package: &str) -> Result<bool, PruneError> {
        let manifest_path = dir.path.join(dir.kind.manifest_file());
        if !manifest_path.exists() {
            // Manifests are optional for egg-info; fall back to looking for the file itself
            return Ok(dir.path.join(TOP_LEVEL_FILE).is_file());
        }

        let manifest =
            fs::read_to_string(&manifest_path).map_err(|e| PruneError::MetadataLookup {
                package: package.to_string(),
                detail: format!("{}: {}", manifest_path.display(), e),
            })?;

        Ok(manifest.lines().any(|line| {
            // RECORD lines are `path,hash,size`; installed-files.txt lines are bare paths
            let entry = line.split(',').next().unwrap_or(line).trim();
            Path::new(entry).file_name().and_then(|n| n.to_str()) == Some(TOP_LEVEL_FILE)
        }))
    }
}

impl MetadataSource for SitePackages {
    fn top_level_names(&self, package: &str) -> Result<Option<Vec<String>>, PruneError> {
        let dir = self
            .dirs
            .get(&normalize_name(package))
            .ok_or_else(|| PruneError::MetadataLookup {
                package: package.to_string(),
                detail: "no installed metadata directory".to_string(),
            })?;

        if !Self::manifest_lists_top_level(dir, package)? {
            return Ok(None);
        }

        let top_level_path = dir.path.join(TOP_LEVEL_FILE);
        let content =
            fs::read_to_string(&top_level_path).map_err(|e| PruneError::MetadataLookup {
                package: package.to_string(),
                detail: format!("{}: {}", top_level_path.display(), e),
            })?;

        Ok(Some(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_lowercase)
                .collect(),
        ))
    }
}

/// Resolves a distribution to its import names, never returning an empty set.
///
/// Lookup failures are logged and recorded in `failures`, then fall back to the
/// lowercased distribution name.
pub fn resolve_import_names(
    package: &str,
    source: &dyn MetadataSource,
    failures: &mut Vec<PruneError>,
) -> BTreeSet<String> {
    let declared = match source.top_level_names(package) {
        Ok(names) => names.unwrap_or_default(),
        Err(e) => {
            warn!("{}", e);
            failures.push(e);
            Vec::new()
        }
    };

    let names: BTreeSet<String> = declared.into_iter().collect();
    if names.is_empty() {
        BTreeSet::from([package.to_lowercase()])
    } else {
        names
    }
}

/// Distribution -> import names, built once per run.
#[derive(Debug, Default, Clone)]
pub struct ImportNameTable {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl ImportNameTable {
    /// Resolves every installed package. `overrides` (keyed by normalized
    /// distribution name) replace the metadata lookup.
    pub fn build(
        installed: &BTreeSet<String>,
        source: &dyn MetadataSource,
        overrides: &BTreeMap<String, Vec<String>>,
        failures: &mut Vec<PruneError>,
    ) -> Self {
        let mut entries = BTreeMap::new();

        for package in installed {
            let names = match overrides.get(&normalize_name(package)) {
                Some(names) if !names.is_empty() => {
                    names.iter().map(|n| n.to_lowercase()).collect()
                }
                _ => resolve_import_names(package, source, failures),
            };
            debug!("{} -> {:?}", package, names);
            entries.insert(package.clone(), names);
        }

        Self { entries }
    }

    pub fn import_names(&self, package: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(package)
    }

    /// Every import name provided by any installed distribution.
    pub fn all_import_names(&self) -> BTreeSet<String> {
        self.entries.values().flatten().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
