pub mod generate;
pub mod identify;
pub mod remove;

use crate::errors::PruneError;
use crate::pyproject::Config;
use crate::venv::{VirtualEnv, find_virtualenv};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// A project root with its located environment and configuration.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub venv: VirtualEnv,
    pub config: Config,
}

impl Project {
    /// Resolves the project at `root`, using `venv_dir` instead of the
    /// conventional directory names when given.
    pub fn discover(root: &Path, venv_dir: Option<&Path>) -> Result<Self> {
        let root = fs::canonicalize(root)
            .map_err(|e| PruneError::io(root, e))
            .with_context(|| format!("Cannot open project root '{}'", root.display()))?;

        let venv = match venv_dir {
            Some(dir) => {
                let dir = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
                VirtualEnv::open(&dir)?
            }
            None => find_virtualenv(&root)?,
        };
        info!(
            "Found virtual environment Python executable at: {}",
            venv.python.display()
        );

        let config = Config::load(&root)?;

        Ok(Self { root, venv, config })
    }
}
