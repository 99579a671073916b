use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const PYTHONPATH_ENV: &str = "PYTHONPATH";

/// The module search path handed to the interpreter through `PYTHONPATH`.
///
/// Kept as an explicit value instead of mutating the process environment so
/// the import probe sees exactly what the caller configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PythonPath {
    entries: Vec<PathBuf>,
}

impl PythonPath {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits a raw `PYTHONPATH` value; empty segments are dropped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let entries = env::split_paths(raw)
            .filter(|entry| !entry.as_os_str().is_empty())
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    #[must_use]
    pub fn contains(&self, dir: &Path) -> bool {
        self.entries.iter().any(|entry| entry == dir)
    }

    /// Puts `dir` at the front of the search path unless it is already listed.
    ///
    /// Returns `true` when the path changed.
    pub fn prepend(&mut self, dir: &Path) -> bool {
        if self.contains(dir) {
            return false;
        }
        self.entries.insert(0, dir.to_path_buf());
        true
    }

    /// Joined value suitable for `PYTHONPATH`, or `None` when empty or when an
    /// entry contains the platform separator.
    #[must_use]
    pub fn to_env_value(&self) -> Option<OsString> {
        if self.entries.is_empty() {
            return None;
        }
        env::join_paths(&self.entries).ok()
    }

    /// Shell line that persists the current value, e.g. for a shell profile.
    #[must_use]
    pub fn export_line(&self) -> Option<String> {
        let value = self.to_env_value()?;
        Some(format!(
            "export {PYTHONPATH_ENV}=\"{}\"",
            value.to_string_lossy()
        ))
    }
}
