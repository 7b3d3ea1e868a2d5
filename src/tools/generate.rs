use crate::manifest::write_requirements;
use crate::pip::{PackageManager, requirement_name};
use crate::tools::Project;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Result of regenerating `requirements.txt`
#[derive(Debug)]
pub struct GenerateResult {
    pub path: PathBuf,
    /// Pinned requirement lines written
    pub package_count: usize,
}

/// Overwrites `requirements.txt` with the environment's `pip freeze` output.
///
/// Usage analysis plays no part. A failed freeze leaves the existing manifest untouched.
pub fn generate_requirements(
    project: &Project,
    package_manager: &dyn PackageManager,
) -> Result<GenerateResult> {
    let frozen = package_manager
        .freeze()
        .context("Error generating requirements.txt")?;
    let path = write_requirements(&project.root, &frozen)?;

    Ok(GenerateResult {
        path,
        package_count: frozen.lines().filter_map(requirement_name).count(),
    })
}

pub mod formatters {
    use super::GenerateResult;

    pub fn format_text(result: &GenerateResult) -> String {
        format!(
            "Generated requirements.txt at {} ({} packages)\n",
            result.path.display(),
            result.package_count
        )
    }
}
