use crate::crawler::{ScanExclusions, collect_used_imports};
use crate::errors::PruneError;
use crate::metadata::{ImportNameTable, MetadataSource};
use crate::pip::PackageManager;
use crate::reconcile::find_unused;
use crate::tools::Project;
use std::collections::BTreeSet;
use tracing::{error, info};

/// Result of unused-package analysis
#[derive(Debug, Default)]
pub struct UnusedAnalysisResult {
    /// Installed distributions (lowercased)
    pub installed: BTreeSet<String>,
    /// Every import name seen in the project sources
    pub used_names: BTreeSet<String>,
    /// Installed distributions whose import names are never imported, sorted
    pub unused: Vec<String>,
    pub import_names: ImportNameTable,
    pub files_scanned: usize,
    /// Recoverable failures hit along the way
    pub failures: Vec<PruneError>,
}

impl UnusedAnalysisResult {
    /// Used import names that belong to an installed distribution.
    pub fn used_installed_names(&self) -> BTreeSet<String> {
        self.import_names
            .all_import_names()
            .intersection(&self.used_names)
            .cloned()
            .collect()
    }

    pub fn parse_failure_count(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| matches!(f, PruneError::SourceParse { .. }))
            .count()
    }
}

/// Finds installed packages that no source file under the project imports.
///
/// A failed package listing degrades to an empty installed set; it is recorded in
/// `failures` rather than aborting.
pub fn analyze_unused(
    project: &Project,
    package_manager: &dyn PackageManager,
    metadata: &dyn MetadataSource,
    show_progress: bool,
) -> UnusedAnalysisResult {
    let mut failures = Vec::new();

    let installed = match package_manager.list_installed() {
        Ok(installed) => installed,
        Err(e) => {
            error!("Error getting installed pip packages: {}", e);
            failures.push(e);
            BTreeSet::new()
        }
    };
    info!("Installed packages: {:?}", installed);

    let import_names = ImportNameTable::build(
        &installed,
        metadata,
        &project.config.import_name_overrides(),
        &mut failures,
    );

    let exclusions =
        ScanExclusions::for_venv(&project.venv.root).with_dir_names(&project.config.exclude);
    let scan = collect_used_imports(&project.root, &exclusions, show_progress);
    failures.extend(scan.failures);

    let unused = find_unused(
        &import_names,
        &scan.used_names,
        &project.config.kept_packages(),
    );

    let result = UnusedAnalysisResult {
        installed,
        used_names: scan.used_names,
        unused,
        import_names,
        files_scanned: scan.files_scanned,
        failures,
    };
    info!("Used packages: {:?}", result.used_installed_names());
    if result.unused.is_empty() {
        info!("No unused packages found");
    }
    result
}

pub mod formatters {
    use super::UnusedAnalysisResult;
    use anyhow::Result;
    use serde::Serialize;

    #[derive(Serialize)]
    struct UnusedReport<'a> {
        unused: &'a [String],
        used_imports: Vec<String>,
        installed_count: usize,
        files_scanned: usize,
        parse_failures: usize,
    }

    /// One `Unused package: <name>` line per unused distribution; empty when none.
    pub fn format_text(result: &UnusedAnalysisResult) -> String {
        let mut output = String::new();
        for package in &result.unused {
            output.push_str(&format!("Unused package: {}\n", package));
        }
        output
    }

    pub fn format_json(result: &UnusedAnalysisResult) -> Result<String> {
        let report = UnusedReport {
            unused: &result.unused,
            used_imports: result.used_installed_names().into_iter().collect(),
            installed_count: result.installed.len(),
            files_scanned: result.files_scanned,
            parse_failures: result.parse_failure_count(),
        };
        Ok(serde_json::to_string_pretty(&report)? + "\n")
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::errors::PruneError;
    use crate::pip::PackageManager;
    use crate::pyproject::Config;
    use crate::tools::Project;
    use crate::venv::VirtualEnv;
    use crate::venv::test_support::make_fake_venv;
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::Path;

    /// Scripted package manager recording uninstall calls.
    #[derive(Default)]
    pub struct FakePip {
        pub installed: Option<Vec<String>>,
        pub freeze_output: Option<String>,
        pub failing_uninstalls: Vec<String>,
        pub uninstalled: RefCell<Vec<String>>,
    }

    impl FakePip {
        pub fn with_installed(packages: &[&str]) -> Self {
            Self {
                installed: Some(packages.iter().map(|p| p.to_string()).collect()),
                ..Self::default()
            }
        }
    }

    fn failure(command: &str) -> PruneError {
        PruneError::SubprocessFailure {
            command: command.to_string(),
            detail: "exit status: 1".to_string(),
        }
    }

    /// Project with `app.py` importing requests and flask, and a `.venv`.
    pub fn scenario_project(temp_dir: &Path) -> Project {
        fs::write(
            temp_dir.join("app.py"),
            "import requests\nfrom flask import Flask\n",
        )
        .unwrap();
        let venv_root = make_fake_venv(temp_dir, ".venv");
        // Packaged code inside the environment must not count as used
        let site = venv_root.join("lib/python3.12/site-packages/pytest");
        fs::create_dir_all(&site).unwrap();
        fs::write(site.join("__init__.py"), "import pytest\n").unwrap();

        Project {
            root: temp_dir.to_path_buf(),
            venv: VirtualEnv::open(&venv_root).unwrap(),
            config: Config::default(),
        }
    }

    impl PackageManager for FakePip {
        fn list_installed(&self) -> Result<BTreeSet<String>, PruneError> {
            self.installed
                .as_ref()
                .map(|p| p.iter().map(|name| name.to_lowercase()).collect())
                .ok_or_else(|| failure("pip list --format=freeze"))
        }

        fn freeze(&self) -> Result<String, PruneError> {
            self.freeze_output.clone().ok_or_else(|| failure("pip freeze"))
        }

        fn uninstall(&self, package: &str) -> Result<(), PruneError> {
            if self.failing_uninstalls.iter().any(|p| p == package) {
                return Err(failure(&format!("pip uninstall -y {package}")));
            }
            self.uninstalled.borrow_mut().push(package.to_string());
            Ok(())
        }
    }
}
