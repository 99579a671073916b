//! Heuristic container detection.
//!
//! Each [`EnvironmentSignal`] is checked independently and the results are
//! OR-combined. Filesystem faults never escape: they are recorded as
//! [`SignalReading::Unreadable`] and count as "signal absent".

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::config::EnvSnapshot;

pub const DOCKER_MARKER: &str = ".dockerenv";
pub const INIT_CGROUP: &str = "proc/1/cgroup";
pub const CONTAINER_RUNTIMES: [&str; 3] = ["docker", "containerd", "kubepods"];
pub const CONTAINER_ENV: &str = "CONTAINER";
pub const KUBERNETES_ENV: &str = "KUBERNETES_SERVICE_HOST";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentSignal {
    /// A marker file dropped by the container runtime.
    MarkerPath(PathBuf),
    /// The init process control-group descriptor names a container runtime.
    ControlGroup {
        descriptor: PathBuf,
        runtimes: Vec<String>,
    },
    /// An environment variable with a non-empty value.
    EnvVar(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalReading {
    Match,
    NoMatch,
    Unreadable(String),
}

impl SignalReading {
    #[must_use]
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

impl EnvironmentSignal {
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::MarkerPath(path) => format!("marker {}", path.display()),
            Self::ControlGroup { descriptor, .. } => format!("cgroup {}", descriptor.display()),
            Self::EnvVar(name) => format!("env {name}"),
        }
    }

    #[must_use]
    pub fn read(&self, env: &EnvSnapshot) -> SignalReading {
        match self {
            Self::MarkerPath(path) => match path.try_exists() {
                Ok(true) => SignalReading::Match,
                Ok(false) => SignalReading::NoMatch,
                Err(err) => SignalReading::Unreadable(err.to_string()),
            },
            Self::ControlGroup {
                descriptor,
                runtimes,
            } => match fs::read(descriptor) {
                Ok(bytes) => {
                    let content = String::from_utf8_lossy(&bytes);
                    if runtimes.iter().any(|name| content.contains(name.as_str())) {
                        SignalReading::Match
                    } else {
                        SignalReading::NoMatch
                    }
                }
                Err(err) => SignalReading::Unreadable(err.to_string()),
            },
            Self::EnvVar(name) => {
                if env.is_non_empty(name) {
                    SignalReading::Match
                } else {
                    SignalReading::NoMatch
                }
            }
        }
    }
}

/// Whether the host looks like a container, with the signals that said so.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerVerdict {
    pub containerized: bool,
    pub matched: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ContainerProbe {
    signals: Vec<EnvironmentSignal>,
    env: EnvSnapshot,
}

impl ContainerProbe {
    /// Probe for the live host: `/.dockerenv`, `/proc/1/cgroup`,
    /// `CONTAINER`, and `KUBERNETES_SERVICE_HOST`.
    #[must_use]
    pub fn new(env: EnvSnapshot) -> Self {
        Self::with_root(Path::new("/"), env)
    }

    /// Same signals with filesystem paths resolved under `root`.
    #[must_use]
    pub fn with_root(root: &Path, env: EnvSnapshot) -> Self {
        let signals = vec![
            EnvironmentSignal::MarkerPath(root.join(DOCKER_MARKER)),
            EnvironmentSignal::ControlGroup {
                descriptor: root.join(INIT_CGROUP),
                runtimes: CONTAINER_RUNTIMES.iter().map(ToString::to_string).collect(),
            },
            EnvironmentSignal::EnvVar(CONTAINER_ENV.to_string()),
            EnvironmentSignal::EnvVar(KUBERNETES_ENV.to_string()),
        ];
        Self::with_signals(signals, env)
    }

    #[must_use]
    pub fn with_signals(signals: Vec<EnvironmentSignal>, env: EnvSnapshot) -> Self {
        Self { signals, env }
    }

    #[must_use]
    pub fn verdict(&self) -> ContainerVerdict {
        let mut matched = Vec::new();
        for signal in &self.signals {
            let reading = signal.read(&self.env);
            debug!(signal = %signal.label(), ?reading, "container signal");
            if reading.is_match() {
                matched.push(signal.label());
            }
        }
        ContainerVerdict {
            containerized: !matched.is_empty(),
            matched,
        }
    }

    #[must_use]
    pub fn detect_container(&self) -> bool {
        self.verdict().containerized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_root() -> tempfile::TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    #[test]
    fn no_signal_means_not_containerized() {
        let root = empty_root();
        let probe = ContainerProbe::with_root(root.path(), EnvSnapshot::testing(&[]));
        let verdict = probe.verdict();
        assert!(!verdict.containerized);
        assert!(verdict.matched.is_empty());
    }

    #[test]
    fn marker_path_alone_is_enough() {
        let root = empty_root();
        fs::write(root.path().join(DOCKER_MARKER), "").expect("marker");
        let probe = ContainerProbe::with_root(root.path(), EnvSnapshot::testing(&[]));
        assert!(probe.detect_container());
        assert_eq!(probe.verdict().matched.len(), 1);
    }

    #[test]
    fn cgroup_descriptor_matches_known_runtimes() {
        let root = empty_root();
        let cgroup = root.path().join(INIT_CGROUP);
        fs::create_dir_all(cgroup.parent().expect("parent")).expect("proc dir");

        fs::write(&cgroup, "0::/init.scope\n").expect("cgroup");
        let probe = ContainerProbe::with_root(root.path(), EnvSnapshot::testing(&[]));
        assert!(!probe.detect_container());

        fs::write(&cgroup, "12:pids:/kubepods/besteffort/pod1234\n").expect("cgroup");
        assert!(probe.detect_container());
    }

    #[test]
    fn unreadable_cgroup_is_not_a_match() {
        let root = empty_root();
        // A directory where the descriptor should be makes the read fail.
        fs::create_dir_all(root.path().join(INIT_CGROUP)).expect("dir in place of file");
        let signal = EnvironmentSignal::ControlGroup {
            descriptor: root.path().join(INIT_CGROUP),
            runtimes: vec!["docker".to_string()],
        };
        let reading = signal.read(&EnvSnapshot::testing(&[]));
        assert!(matches!(reading, SignalReading::Unreadable(_)));

        let probe = ContainerProbe::with_root(root.path(), EnvSnapshot::testing(&[]));
        assert!(!probe.detect_container());
    }

    #[test]
    fn either_environment_variable_counts_when_non_empty() {
        let root = empty_root();
        for key in [CONTAINER_ENV, KUBERNETES_ENV] {
            let set = EnvSnapshot::testing(&[(key, "1")]);
            let probe = ContainerProbe::with_root(root.path(), set);
            assert!(probe.detect_container(), "{key} should mark a container");
            let blank = EnvSnapshot::testing(&[(key, "")]);
            let empty = ContainerProbe::with_root(root.path(), blank);
            assert!(!empty.detect_container(), "empty {key} should not count");
        }
    }

    #[test]
    fn verdict_lists_every_matching_signal() {
        let root = empty_root();
        fs::write(root.path().join(DOCKER_MARKER), "").expect("marker");
        let probe = ContainerProbe::with_root(
            root.path(),
            EnvSnapshot::testing(&[(CONTAINER_ENV, "podman")]),
        );
        let verdict = probe.verdict();
        assert!(verdict.containerized);
        assert_eq!(
            verdict.matched,
            vec![
                format!("marker {}", root.path().join(DOCKER_MARKER).display()),
                "env CONTAINER".to_string(),
            ]
        );
    }
}
