//! Ordered fallback installation.
//!
//! [`InstallOrchestrator`] detects the container verdict once, derives the
//! command environment from it, and then walks the tier list. A tier counts
//! only when its action succeeds *and* the package imports afterwards; any
//! other outcome is recorded and the next tier runs. Nothing is retried.

use std::path::PathBuf;

use pif_python::{ImportCheck, PackageName, PythonPath};
use serde::Serialize;
use tracing::{debug, info};

use crate::effects::Effects;
use crate::environment::ContainerVerdict;
use crate::process::{CommandExit, CommandOutcome};
use crate::tiers::{default_tiers, InstallTier};

pub const PIP_NO_CACHE_DIR: &str = "PIP_NO_CACHE_DIR";
pub const PIP_DISABLE_PIP_VERSION_CHECK: &str = "PIP_DISABLE_PIP_VERSION_CHECK";

/// Extra variables handed to every installer command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandEnvironment {
    vars: Vec<(String, String)>,
}

impl CommandEnvironment {
    /// Containers get pip without a local cache and without the
    /// version-check request.
    #[must_use]
    pub fn for_verdict(verdict: &ContainerVerdict) -> Self {
        let mut env = Self::default();
        if verdict.containerized {
            env.set(PIP_NO_CACHE_DIR, "1");
            env.set(PIP_DISABLE_PIP_VERSION_CHECK, "1");
        }
        env
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.vars.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.vars.push((key, value)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "tier", rename_all = "kebab-case")]
pub enum InstallResult {
    Verified(String),
    AllFailed,
}

impl InstallResult {
    #[must_use]
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Verified(_) => 0,
            Self::AllFailed => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum TierDisposition {
    Verified,
    CommandFailed { exit_code: Option<i32> },
    TimedOut { after_secs: u64 },
    ImportFailed { error_type: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierAttempt {
    pub label: String,
    pub action: String,
    pub disposition: TierDisposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl TierAttempt {
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.disposition == TierDisposition::Verified
    }

    /// True when the installer itself reported success.
    #[must_use]
    pub fn action_succeeded(&self) -> bool {
        matches!(
            self.disposition,
            TierDisposition::Verified | TierDisposition::ImportFailed { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub package: String,
    pub project_dir: PathBuf,
    pub container: ContainerVerdict,
    pub command_env: CommandEnvironment,
    pub attempts: Vec<TierAttempt>,
    pub result: InstallResult,
    #[serde(skip)]
    pub search_path: PythonPath,
}

/// Progress callbacks; every method defaults to doing nothing.
pub trait InstallObserver {
    fn container_detected(&self, _verdict: &ContainerVerdict, _env: &CommandEnvironment) {}
    fn tier_started(&self, _index: usize, _tier: &InstallTier) {}
    fn tier_finished(&self, _index: usize, _tier: &InstallTier, _attempt: &TierAttempt) {}
}

pub struct NoopObserver;

impl InstallObserver for NoopObserver {}

pub struct InstallOrchestrator<'a> {
    effects: &'a dyn Effects,
    observer: &'a dyn InstallObserver,
    package: PackageName,
    project_dir: PathBuf,
    search_path: PythonPath,
    tiers: Vec<InstallTier>,
}

impl<'a> InstallOrchestrator<'a> {
    #[must_use]
    pub fn new(
        effects: &'a dyn Effects,
        package: PackageName,
        project_dir: impl Into<PathBuf>,
        search_path: PythonPath,
    ) -> Self {
        Self {
            effects,
            observer: &NoopObserver,
            package,
            project_dir: project_dir.into(),
            search_path,
            tiers: default_tiers(),
        }
    }

    #[must_use]
    pub fn with_tiers(mut self, tiers: Vec<InstallTier>) -> Self {
        self.tiers = tiers;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: &'a dyn InstallObserver) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn install(self) -> InstallResult {
        self.run().result
    }

    /// Runs the tiers in order and returns the full record of what happened.
    #[must_use]
    pub fn run(mut self) -> InstallReport {
        let verdict = self.effects.environment().verdict();
        let command_env = CommandEnvironment::for_verdict(&verdict);
        info!(
            containerized = verdict.containerized,
            matched = ?verdict.matched,
            "environment probed"
        );
        self.observer.container_detected(&verdict, &command_env);

        let mut attempts = Vec::with_capacity(self.tiers.len());
        let mut result = InstallResult::AllFailed;
        for (index, tier) in self.tiers.iter().enumerate() {
            self.observer.tier_started(index, tier);
            let attempt = match tier {
                InstallTier::Command {
                    label,
                    command,
                    timeout,
                } => {
                    let outcome = self.effects.runner().run(
                        command,
                        *timeout,
                        &command_env,
                        &self.project_dir,
                    );
                    if outcome.succeeded {
                        let importer = self.effects.importer();
                        let check = importer.check(&self.package, &self.search_path);
                        attempt_after_import(label, tier.describe(), check)
                    } else {
                        failed_command_attempt(label, tier.describe(), &outcome)
                    }
                }
                InstallTier::PathMutation { label } => {
                    let changed = self.search_path.prepend(&self.project_dir);
                    debug!(changed, dir = %self.project_dir.display(), "search path updated");
                    let importer = self.effects.importer();
                    let check = importer.check(&self.package, &self.search_path);
                    attempt_after_import(label, tier.describe(), check)
                }
            };
            if let Some(diagnostic) = &attempt.diagnostic {
                debug!(tier = %attempt.label, %diagnostic, "tier rejected");
            }
            self.observer.tier_finished(index, tier, &attempt);
            let verified = attempt.is_verified();
            attempts.push(attempt);
            if verified {
                result = InstallResult::Verified(tier.label().to_string());
                break;
            }
        }

        InstallReport {
            package: self.package.to_string(),
            project_dir: self.project_dir,
            container: verdict,
            command_env,
            attempts,
            result,
            search_path: self.search_path,
        }
    }
}

fn attempt_after_import(label: &str, action: String, check: ImportCheck) -> TierAttempt {
    match check {
        ImportCheck::Importable => TierAttempt {
            label: label.to_string(),
            action,
            disposition: TierDisposition::Verified,
            diagnostic: None,
        },
        ImportCheck::Failed {
            error_type,
            message,
        } => TierAttempt {
            label: label.to_string(),
            action,
            diagnostic: Some(format!("{error_type}: {message}")),
            disposition: TierDisposition::ImportFailed { error_type },
        },
    }
}

fn failed_command_attempt(label: &str, action: String, outcome: &CommandOutcome) -> TierAttempt {
    let disposition = match outcome.exit {
        CommandExit::Exited { code } => TierDisposition::CommandFailed {
            exit_code: Some(code),
        },
        CommandExit::TimedOut { after_secs } => TierDisposition::TimedOut { after_secs },
        CommandExit::SpawnFailed => TierDisposition::CommandFailed { exit_code: None },
    };
    TierAttempt {
        label: label.to_string(),
        action,
        disposition,
        diagnostic: Some(command_diagnostic(outcome)),
    }
}

fn command_diagnostic(outcome: &CommandOutcome) -> String {
    let stderr = outcome.stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = outcome.stdout.trim();
    if stdout.is_empty() {
        "command failed without output".to_string()
    } else {
        stdout.to_string()
    }
}
