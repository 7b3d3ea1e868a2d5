use crate::errors::PruneError;
use crate::imports::extract_top_level_names;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Paths and directory names skipped by the scan.
#[derive(Debug, Clone, Default)]
pub struct ScanExclusions {
    /// Subtrees skipped by path (always contains the virtual environment)
    pub paths: Vec<PathBuf>,
    /// Directories skipped wherever they appear
    pub dir_names: Vec<String>,
}

impl ScanExclusions {
    pub fn for_venv(venv_root: &Path) -> Self {
        Self {
            paths: vec![venv_root.to_path_buf()],
            dir_names: Vec::new(),
        }
    }

    pub fn with_dir_names(mut self, dir_names: &[String]) -> Self {
        self.dir_names.extend(dir_names.iter().cloned());
        self
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }
        if self.paths.iter().any(|p| entry.path().starts_with(p)) {
            return true;
        }
        // The root itself is never excluded by name
        entry.depth() > 0
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.dir_names.iter().any(|d| d == name))
    }
}

/// Import names collected from a project tree.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub used_names: BTreeSet<String>,
    pub files_scanned: usize,
    /// Paths that could not be walked, read or parsed and contributed nothing
    pub failures: Vec<PruneError>,
}

/// Discovers all Python files under `root`, recursively, in a stable order.
///
/// Paths the walk cannot read are pushed to `failures` as I/O errors and skipped.
pub fn discover_python_files(
    root: &Path,
    exclusions: &ScanExclusions,
    failures: &mut Vec<PruneError>,
) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !exclusions.is_excluded(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable path: {}", e);
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                failures.push(PruneError::io(path, io::Error::from(e)));
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "py"))
        .collect()
}

/// Top-level import names of one file.
///
/// Invalid UTF-8 is replaced rather than rejected.
pub fn scan_python_file(file_path: &Path) -> Result<BTreeSet<String>, PruneError> {
    let bytes = fs::read(file_path).map_err(|e| PruneError::io(file_path, e))?;
    let python_code = String::from_utf8_lossy(&bytes);

    extract_top_level_names(&python_code).map_err(|e| PruneError::SourceParse {
        path: file_path.to_path_buf(),
        detail: e.to_string(),
    })
}

fn scan_spinner(show_progress: bool) -> ProgressBar {
    if !show_progress {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Collects the import names used anywhere under `root`.
///
/// A file that cannot be read or parsed is recorded in `failures` and the scan
/// continues.
pub fn collect_used_imports(
    root: &Path,
    exclusions: &ScanExclusions,
    show_progress: bool,
) -> ScanResult {
    let mut result = ScanResult::default();
    let python_files = discover_python_files(root, exclusions, &mut result.failures);
    let pb = scan_spinner(show_progress);
    pb.set_message("Scanning imports");

    for file_path in &python_files {
        pb.inc(1);
        match scan_python_file(file_path) {
            Ok(names) => {
                result.used_names.extend(names);
            }
            Err(e) => {
                warn!("{}", e);
                result.failures.push(e);
            }
        }
        result.files_scanned += 1;
    }
    pb.finish_and_clear();

    debug!(
        "Scanned {} files, {} import names",
        result.files_scanned,
        result.used_names.len()
    );
    result
}
