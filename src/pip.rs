//! Package manager boundary.
//!
//! Everything that talks to `pip` goes through [`PackageManager`] so the analysis
//! can run against a fake environment in tests.

use crate::errors::PruneError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

pub trait PackageManager {
    /// Lowercased names of every installed distribution.
    fn list_installed(&self) -> Result<BTreeSet<String>, PruneError>;

    /// Raw `pip freeze` output.
    fn freeze(&self) -> Result<String, PruneError>;

    fn uninstall(&self, package: &str) -> Result<(), PruneError>;
}

/// Runs `pip` through a specific interpreter (`<python> -m pip ...`).
#[derive(Debug, Clone)]
pub struct Pip {
    python: PathBuf,
}

impl Pip {
    pub fn new(python: &Path) -> Self {
        Self {
            python: python.to_path_buf(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output, PruneError> {
        let command = format!("pip {}", args.join(" "));
        debug!("running {} {}", self.python.display(), command);

        let output = Command::new(&self.python)
            .arg("-m")
            .arg("pip")
            .args(args)
            .output()
            .map_err(|e| PruneError::SubprocessFailure {
                command: command.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PruneError::SubprocessFailure {
                command,
                detail: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        Ok(output)
    }
}

impl PackageManager for Pip {
    fn list_installed(&self) -> Result<BTreeSet<String>, PruneError> {
        let output = self.run(&["list", "--format=freeze"])?;
        Ok(parse_freeze_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    fn freeze(&self) -> Result<String, PruneError> {
        let output = self.run(&["freeze"])?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn uninstall(&self, package: &str) -> Result<(), PruneError> {
        let output = self.run(&["uninstall", "-y", package])?;
        debug!("{}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    }
}

/// Extracts the package name from a `name==version` requirement line.
///
/// Returns `None` for blank lines, comments, and pip options such as `-e`.
pub fn requirement_name(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
        return None;
    }

    let name = line
        .split("==")
        .next()
        .and_then(|head| head.split(" @ ").next())
        .unwrap_or(line)
        .trim();

    if name.is_empty() {
        None
    } else {
        Some(name.to_lowercase())
    }
}

/// Parses `pip list --format=freeze` output into lowercased package names.
pub fn parse_freeze_listing(stdout: &str) -> BTreeSet<String> {
    stdout.lines().filter_map(requirement_name).collect()
}
