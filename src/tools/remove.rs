use crate::errors::PruneError;
use crate::manifest::{ManifestUpdate, remove_from_requirements};
use crate::pip::PackageManager;
use crate::reconcile::removal_candidates;
use crate::tools::Project;
use crate::tools::identify::UnusedAnalysisResult;
use anyhow::Result;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// The package manager removes itself last so the uninstalls before it still run.
const PACKAGE_MANAGER: &str = "pip";

/// Uninstall order for `planned`: sorted, with `pip` moved to the end.
pub fn uninstall_order(planned: &[String]) -> Vec<String> {
    let (mut order, manager): (Vec<String>, Vec<String>) = planned
        .iter()
        .cloned()
        .partition(|package| package.as_str() != PACKAGE_MANAGER);
    order.extend(manager);
    order
}

/// Result of removing unused packages
#[derive(Debug, Default)]
pub struct RemovalResult {
    /// Packages selected for removal, sorted
    pub planned: Vec<String>,
    /// `None` in dry-run mode
    pub manifest: Option<ManifestUpdate>,
    pub uninstalled: Vec<String>,
    pub failures: Vec<PruneError>,
    pub dry_run: bool,
}

impl RemovalResult {
    pub fn failed_packages(&self) -> Vec<&str> {
        self.planned
            .iter()
            .filter(|p| !self.uninstalled.contains(*p))
            .map(String::as_str)
            .collect()
    }
}

/// Drops unused packages from `requirements.txt`, then uninstalls each one.
///
/// One failed uninstall does not stop the rest. Manifest I/O errors are fatal.
pub fn remove_unused(
    project: &Project,
    analysis: &UnusedAnalysisResult,
    package_manager: &dyn PackageManager,
    dry_run: bool,
) -> Result<RemovalResult> {
    let planned = removal_candidates(&analysis.unused, &analysis.used_names);
    for held_back in analysis.unused.iter().filter(|p| !planned.contains(*p)) {
        warn!("Keeping {}: its name is imported by the project", held_back);
    }

    if dry_run {
        return Ok(RemovalResult {
            planned,
            dry_run: true,
            ..RemovalResult::default()
        });
    }

    let unused_set: BTreeSet<String> = planned.iter().cloned().collect();
    let manifest = remove_from_requirements(&project.root, &unused_set, &analysis.used_names)?;
    if manifest == ManifestUpdate::Missing {
        debug!("No requirements.txt in {}; skipping", project.root.display());
    }

    let mut uninstalled = Vec::new();
    let mut failures = Vec::new();
    for package in &uninstall_order(&planned) {
        info!("Removing package: {}", package);
        match package_manager.uninstall(package) {
            Ok(()) => uninstalled.push(package.clone()),
            Err(e) => {
                warn!("{}", e);
                failures.push(e);
            }
        }
    }

    Ok(RemovalResult {
        planned,
        manifest: Some(manifest),
        uninstalled,
        failures,
        dry_run: false,
    })
}

pub mod formatters {
    use super::RemovalResult;
    use crate::manifest::ManifestUpdate;

    pub fn format_text(result: &RemovalResult) -> String {
        let mut output = String::new();

        if result.planned.is_empty() {
            output.push_str("No unused packages to remove.\n");
            return output;
        }

        if result.dry_run {
            for package in &result.planned {
                output.push_str(&format!("Would remove package: {}\n", package));
            }
            return output;
        }

        match &result.manifest {
            Some(ManifestUpdate::Rewritten { path, removed }) => {
                output.push_str(&format!(
                    "Updated {} ({} entries removed)\n",
                    path.display(),
                    removed.len()
                ));
            }
            Some(ManifestUpdate::Missing) | None => {}
        }

        for package in &result.uninstalled {
            output.push_str(&format!("Removed package: {}\n", package));
        }
        for package in result.failed_packages() {
            output.push_str(&format!("Failed to remove package: {}\n", package));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::manifest_path;
    use crate::metadata::test_support::FakeMetadata;
    use crate::tools::identify::analyze_unused;
    use crate::tools::identify::test_support::{FakePip, scenario_project};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_remove_rewrites_manifest_and_uninstalls() {
        let temp_dir = TempDir::new().unwrap();
        let project = scenario_project(temp_dir.path());
        fs::write(
            manifest_path(&project.root),
            "pytest==7.4.0\nrequests==2.31.0\n",
        )
        .unwrap();
        let pip = FakePip::with_installed(&["requests", "flask", "pytest"]);

        let analysis = analyze_unused(&project, &pip, &FakeMetadata::default(), false);
        let result = remove_unused(&project, &analysis, &pip, false).unwrap();

        assert_eq!(
            fs::read_to_string(manifest_path(&project.root)).unwrap(),
            "requests==2.31.0\n"
        );
        assert_eq!(*pip.uninstalled.borrow(), vec!["pytest".to_string()]);
        assert!(result.failures.is_empty());
        assert!(formatters::format_text(&result).contains("Removed package: pytest\n"));
    }

    #[test]
    fn test_pip_is_uninstalled_last() {
        let temp_dir = TempDir::new().unwrap();
        let project = scenario_project(temp_dir.path());
        fs::write(
            manifest_path(&project.root),
            "pip==24.0\npytest==7.4.0\nrequests==2.31.0\nsetuptools==69.0.0\n",
        )
        .unwrap();
        let pip = FakePip::with_installed(&["requests", "flask", "pip", "pytest", "setuptools"]);

        let analysis = analyze_unused(&project, &pip, &FakeMetadata::default(), false);
        let result = remove_unused(&project, &analysis, &pip, false).unwrap();

        assert_eq!(result.planned, vec!["pip", "pytest", "setuptools"]);
        assert_eq!(
            *pip.uninstalled.borrow(),
            vec![
                "pytest".to_string(),
                "setuptools".to_string(),
                "pip".to_string()
            ]
        );
        assert_eq!(
            fs::read_to_string(manifest_path(&project.root)).unwrap(),
            "requests==2.31.0\n"
        );
    }

    #[test]
    fn test_uninstall_order_without_pip_is_unchanged() {
        let planned = vec!["black".to_string(), "pytest".to_string()];
        assert_eq!(uninstall_order(&planned), planned);
    }

    #[test]
    fn test_missing_manifest_still_uninstalls() {
        let temp_dir = TempDir::new().unwrap();
        let project = scenario_project(temp_dir.path());
        let pip = FakePip::with_installed(&["requests", "flask", "pytest", "black"]);

        let analysis = analyze_unused(&project, &pip, &FakeMetadata::default(), false);
        let result = remove_unused(&project, &analysis, &pip, false).unwrap();

        assert_eq!(result.manifest, Some(ManifestUpdate::Missing));
        assert!(!manifest_path(&project.root).exists());
        assert_eq!(
            *pip.uninstalled.borrow(),
            vec!["black".to_string(), "pytest".to_string()]
        );
    }

    #[test]
    fn test_failed_uninstall_does_not_block_the_rest() {
        let temp_dir = TempDir::new().unwrap();
        let project = scenario_project(temp_dir.path());
        let mut pip = FakePip::with_installed(&["requests", "flask", "alpha", "beta", "gamma"]);
        pip.failing_uninstalls = vec!["beta".to_string()];

        let analysis = analyze_unused(&project, &pip, &FakeMetadata::default(), false);
        let result = remove_unused(&project, &analysis, &pip, false).unwrap();

        assert_eq!(result.uninstalled, vec!["alpha", "gamma"]);
        assert_eq!(result.failed_packages(), vec!["beta"]);
        assert_eq!(crate::errors::exit_code_for(&result.failures), 4);
        assert!(formatters::format_text(&result).contains("Failed to remove package: beta\n"));
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let project = scenario_project(temp_dir.path());
        let original = "pytest==7.4.0\nrequests==2.31.0\n";
        fs::write(manifest_path(&project.root), original).unwrap();
        let pip = FakePip::with_installed(&["requests", "flask", "pytest"]);

        let analysis = analyze_unused(&project, &pip, &FakeMetadata::default(), false);
        let result = remove_unused(&project, &analysis, &pip, true).unwrap();

        assert_eq!(result.planned, vec!["pytest"]);
        assert!(pip.uninstalled.borrow().is_empty());
        assert_eq!(
            fs::read_to_string(manifest_path(&project.root)).unwrap(),
            original
        );
        assert_eq!(
            formatters::format_text(&result),
            "Would remove package: pytest\n"
        );
    }

    #[test]
    fn test_name_collision_is_held_back() {
        let temp_dir = TempDir::new().unwrap();
        let project = scenario_project(temp_dir.path());
        fs::write(temp_dir.path().join("auth.py"), "import jwt\n").unwrap();
        fs::write(manifest_path(&project.root), "jwt==1.3.1\n").unwrap();
        let pip = FakePip::with_installed(&["requests", "flask", "jwt"]);
        // The installed `jwt` dist claims a different top-level module
        let metadata = FakeMetadata::default().with("jwt", &["jose_jwt"]);

        let analysis = analyze_unused(&project, &pip, &metadata, false);
        assert_eq!(analysis.unused, vec!["jwt"]);

        let result = remove_unused(&project, &analysis, &pip, false).unwrap();
        assert!(result.planned.is_empty());
        assert!(pip.uninstalled.borrow().is_empty());
        assert_eq!(
            fs::read_to_string(manifest_path(&project.root)).unwrap(),
            "jwt==1.3.1\n"
        );
    }
}
