use std::path::PathBuf;
use thiserror::Error;

/// Failure classes surfaced while analyzing a project.
///
/// Only some of these end a run. The rest are recorded next to the results and
/// the run keeps going with a fallback value.
#[derive(Debug, Error)]
pub enum PruneError {
    #[error("No virtual environment found in {}", root.display())]
    EnvironmentNotFound { root: PathBuf },

    #[error("`{command}` failed: {detail}")]
    SubprocessFailure { command: String, detail: String },

    #[error("Could not read metadata for {package}: {detail}")]
    MetadataLookup { package: String, detail: String },

    #[error("Could not parse {}: {detail}", path.display())]
    SourceParse { path: PathBuf, detail: String },

    #[error("No requirements file at {}", path.display())]
    ManifestMissing { path: PathBuf },

    #[error("Invalid configuration in {}: {detail}", path.display())]
    Config { path: PathBuf, detail: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PruneError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PruneError::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this failure class.
    ///
    /// Classes with a defined fallback (metadata, parse, missing manifest) map to 0.
    pub fn exit_code(&self) -> i32 {
        match self {
            PruneError::Io { .. } => 1,
            PruneError::EnvironmentNotFound { .. } => 3,
            PruneError::SubprocessFailure { .. } => 4,
            PruneError::Config { .. } => 5,
            PruneError::MetadataLookup { .. }
            | PruneError::SourceParse { .. }
            | PruneError::ManifestMissing { .. } => 0,
        }
    }

    /// True when the failure means part of the requested work did not happen.
    pub fn is_degrading(&self) -> bool {
        self.exit_code() != 0
    }
}

/// Exit code for a run that finished but collected recoverable failures.
pub fn exit_code_for(failures: &[PruneError]) -> i32 {
    failures
        .iter()
        .find(|f| f.is_degrading())
        .map_or(0, PruneError::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_for_fatal_classes() {
        let not_found = PruneError::EnvironmentNotFound {
            root: PathBuf::from("proj"),
        };
        let subprocess = PruneError::SubprocessFailure {
            command: "pip list".to_string(),
            detail: "exit status 1".to_string(),
        };
        let config = PruneError::Config {
            path: PathBuf::from("pyproject.toml"),
            detail: "bad".to_string(),
        };

        assert_eq!(not_found.exit_code(), 3);
        assert_eq!(subprocess.exit_code(), 4);
        assert_eq!(config.exit_code(), 5);
    }

    #[test]
    fn test_exit_code_for_ignores_fallback_failures() {
        let failures = vec![
            PruneError::MetadataLookup {
                package: "pillow".to_string(),
                detail: "no dist-info".to_string(),
            },
            PruneError::SourceParse {
                path: PathBuf::from("bad.py"),
                detail: "unexpected token".to_string(),
            },
        ];
        assert_eq!(exit_code_for(&failures), 0);
        assert_eq!(exit_code_for(&[]), 0);
    }

    #[test]
    fn test_exit_code_for_picks_first_degrading_failure() {
        let failures = vec![
            PruneError::SourceParse {
                path: PathBuf::from("bad.py"),
                detail: "unexpected token".to_string(),
            },
            PruneError::SubprocessFailure {
                command: "pip uninstall -y pytest".to_string(),
                detail: "exit status 1".to_string(),
            },
        ];
        assert_eq!(exit_code_for(&failures), 4);
    }

    #[test]
    fn test_not_found_message_names_root() {
        let err = PruneError::EnvironmentNotFound {
            root: PathBuf::from("my/project"),
        };
        assert_eq!(err.to_string(), "No virtual environment found in my/project");
    }
}
