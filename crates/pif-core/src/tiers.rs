use std::time::Duration;

use serde::Serialize;

pub const EDITABLE_INSTALL: &str = "editable install";
pub const STANDARD_INSTALL: &str = "standard install";
pub const SETUP_DEVELOP: &str = "setup.py develop";
pub const PATH_MUTATION: &str = "path-mutation";

/// One fallback strategy. The tier list is tried front to back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InstallTier {
    /// Run an external installer through the shell, bounded by `timeout`.
    Command {
        label: String,
        command: String,
        #[serde(rename = "timeout_secs", serialize_with = "as_secs")]
        timeout: Duration,
    },
    /// Put the project directory on the module search path.
    PathMutation { label: String },
}

impl InstallTier {
    #[must_use]
    pub fn command(label: impl Into<String>, command: impl Into<String>, timeout: Duration) -> Self {
        Self::Command {
            label: label.into(),
            command: command.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn path_mutation() -> Self {
        Self::PathMutation {
            label: PATH_MUTATION.to_string(),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Command { label, .. } | Self::PathMutation { label } => label,
        }
    }

    /// Human description used in progress lines, e.g. `pip install . (60s timeout)`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Command {
                command, timeout, ..
            } => format!("{command} ({}s timeout)", timeout.as_secs()),
            Self::PathMutation { .. } => "add project directory to PYTHONPATH".to_string(),
        }
    }
}

fn as_secs<S: serde::Serializer>(timeout: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(timeout.as_secs())
}

/// The canonical tier order: editable install, standard install,
/// `setup.py develop`, then the search-path fallback.
#[must_use]
pub fn default_tiers() -> Vec<InstallTier> {
    vec![
        InstallTier::command(EDITABLE_INSTALL, "pip install -e .", Duration::from_secs(60)),
        InstallTier::command(STANDARD_INSTALL, "pip install .", Duration::from_secs(60)),
        InstallTier::command(SETUP_DEVELOP, "python setup.py develop", Duration::from_secs(30)),
        InstallTier::path_mutation(),
    ]
}
