use crate::errors::PruneError;
use std::path::{Path, PathBuf};

/// Directory names searched for a virtual environment, in priority order.
pub const CANDIDATE_DIRS: [&str; 4] = ["venv", "env", ".venv", ".env"];

/// A located virtual environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    /// Environment directory (e.g. `project/.venv`)
    pub root: PathBuf,
    /// Interpreter inside the environment
    pub python: PathBuf,
}

/// Interpreter path relative to an environment root.
pub fn interpreter_relative_path() -> PathBuf {
    if cfg!(windows) {
        Path::new("Scripts").join("python.exe")
    } else {
        Path::new("bin").join("python")
    }
}

impl VirtualEnv {
    /// Opens an explicit environment directory.
    pub fn open(root: &Path) -> Result<Self, PruneError> {
        let python = root.join(interpreter_relative_path());
        if python.exists() {
            Ok(VirtualEnv {
                root: root.to_path_buf(),
                python,
            })
        } else {
            Err(PruneError::EnvironmentNotFound {
                root: root.to_path_buf(),
            })
        }
    }
}

/// Finds the virtual environment directly under `project_root`.
///
/// Only top-level children named in [`CANDIDATE_DIRS`] are considered.
pub fn find_virtualenv(project_root: &Path) -> Result<VirtualEnv, PruneError> {
    CANDIDATE_DIRS
        .iter()
        .find_map(|dir| VirtualEnv::open(&project_root.join(dir)).ok())
        .ok_or_else(|| PruneError::EnvironmentNotFound {
            root: project_root.to_path_buf(),
        })
}
