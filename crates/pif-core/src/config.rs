use std::collections::HashMap;
use std::env;

use pif_python::{PythonPath, PYTHONPATH_ENV, RUNTIME_PYTHON_ENV};

pub(crate) const DEFAULT_MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// Point-in-time copy of the process environment.
///
/// Everything that reads environment variables goes through a snapshot so
/// tests can supply their own values instead of mutating the process.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    #[must_use]
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn is_non_empty(&self, key: &str) -> bool {
        self.var(key).is_some_and(|value| !value.is_empty())
    }

    #[must_use]
    pub fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) python: PythonConfig,
    pub(crate) capture: CaptureConfig,
    pub(crate) progress: ProgressConfig,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    #[must_use]
    pub fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        Self {
            python: PythonConfig {
                interpreter: snapshot
                    .var(RUNTIME_PYTHON_ENV)
                    .filter(|value| !value.trim().is_empty())
                    .map(ToOwned::to_owned),
                search_path: snapshot
                    .var(PYTHONPATH_ENV)
                    .map(PythonPath::parse)
                    .unwrap_or_default(),
            },
            capture: CaptureConfig {
                max_bytes: snapshot
                    .var("PIF_MAX_CAPTURE_BYTES")
                    .and_then(|raw| raw.trim().parse::<usize>().ok())
                    .filter(|value| *value > 0)
                    .unwrap_or(DEFAULT_MAX_CAPTURE_BYTES),
            },
            progress: ProgressConfig {
                enabled: snapshot.var("PIF_PROGRESS").map(|value| value != "0"),
            },
        }
    }

    #[must_use]
    pub fn python(&self) -> &PythonConfig {
        &self.python
    }

    #[must_use]
    pub fn capture(&self) -> &CaptureConfig {
        &self.capture
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressConfig {
        &self.progress
    }
}

#[derive(Debug, Clone)]
pub struct PythonConfig {
    pub interpreter: Option<String>,
    pub search_path: PythonPath,
}

#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    pub max_bytes: usize,
}

/// `None` means "decide from whether stderr is a terminal".
#[derive(Debug, Clone, Copy)]
pub struct ProgressConfig {
    pub enabled: Option<bool>,
}
