use crate::errors::PruneError;
use crate::metadata::normalize_name;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const TOOL_TABLE: &str = "pyprune";

/// Settings read from `[tool.pyprune]` in `pyproject.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Distributions never reported as unused
    pub keep: Vec<String>,
    /// Extra directory names skipped while scanning sources
    pub exclude: Vec<String>,
    /// Distribution -> import names, replacing the metadata lookup
    pub import_names: BTreeMap<String, Vec<String>>,
}

impl Config {
    /// Loads `<project_root>/pyproject.toml`. A missing file or table yields defaults.
    pub fn load(project_root: &Path) -> Result<Self, PruneError> {
        let pyproject_path = project_root.join("pyproject.toml");

        if !pyproject_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&pyproject_path)
            .map_err(|e| PruneError::io(&pyproject_path, e))?;
        Self::from_pyproject_str(&content).map_err(|detail| PruneError::Config {
            path: pyproject_path,
            detail,
        })
    }

    fn from_pyproject_str(content: &str) -> Result<Self, String> {
        let toml: toml::Value = toml::from_str(content).map_err(|e| e.to_string())?;

        match toml.get("tool").and_then(|t| t.get(TOOL_TABLE)) {
            Some(table) => table
                .clone()
                .try_into::<Config>()
                .map_err(|e| format!("[tool.{TOOL_TABLE}]: {e}")),
            None => Ok(Self::default()),
        }
    }

    /// Normalized names from `keep`.
    pub fn kept_packages(&self) -> BTreeSet<String> {
        self.keep.iter().map(|name| normalize_name(name)).collect()
    }

    /// `import-names` keyed by normalized distribution name.
    pub fn import_name_overrides(&self) -> BTreeMap<String, Vec<String>> {
        self.import_names
            .iter()
            .map(|(package, names)| (normalize_name(package), names.clone()))
            .collect()
    }
}
