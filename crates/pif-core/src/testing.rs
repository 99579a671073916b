//! Scripted effect doubles shared by the unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use pif_python::{ImportCheck, PackageName, PythonPath};

use crate::effects::{CommandRunner, Effects, EnvironmentProbe, ImportProbe};
use crate::environment::ContainerVerdict;
use crate::orchestrator::CommandEnvironment;
use crate::process::CommandOutcome;

pub(crate) struct RunnerCall {
    pub(crate) command: String,
    pub(crate) env: CommandEnvironment,
    pub(crate) cwd: PathBuf,
}

/// Replays queued outcomes; an exhausted queue answers with a failure.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    outcomes: Mutex<VecDeque<CommandOutcome>>,
    calls: Mutex<Vec<RunnerCall>>,
}

impl ScriptedRunner {
    pub(crate) fn with(outcomes: Vec<CommandOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::default(),
        }
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|call| call.command.clone())
            .collect()
    }

    pub(crate) fn envs(&self) -> Vec<CommandEnvironment> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|call| call.env.clone())
            .collect()
    }

    pub(crate) fn cwds(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|call| call.cwd.clone())
            .collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(
        &self,
        command: &str,
        _timeout: Duration,
        env: &CommandEnvironment,
        cwd: &Path,
    ) -> CommandOutcome {
        self.calls.lock().expect("calls lock").push(RunnerCall {
            command: command.to_string(),
            env: env.clone(),
            cwd: cwd.to_path_buf(),
        });
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .pop_front()
            .unwrap_or_else(|| failed("no scripted outcome"))
    }
}

/// Answers import checks from a queue; once empty, everything fails.
#[derive(Default)]
pub(crate) struct ScriptedImporter {
    answers: Mutex<VecDeque<bool>>,
    seen_paths: Mutex<Vec<PythonPath>>,
}

impl ScriptedImporter {
    pub(crate) fn with(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            seen_paths: Mutex::default(),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen_paths.lock().expect("paths lock").len()
    }

    pub(crate) fn last_path(&self) -> Option<PythonPath> {
        self.seen_paths.lock().expect("paths lock").last().cloned()
    }
}

impl ImportProbe for ScriptedImporter {
    fn check(&self, package: &PackageName, search_path: &PythonPath) -> ImportCheck {
        self.seen_paths
            .lock()
            .expect("paths lock")
            .push(search_path.clone());
        let importable = self
            .answers
            .lock()
            .expect("answers lock")
            .pop_front()
            .unwrap_or(false);
        if importable {
            ImportCheck::Importable
        } else {
            ImportCheck::Failed {
                error_type: "ModuleNotFoundError".to_string(),
                message: format!("No module named '{package}'"),
            }
        }
    }
}

pub(crate) struct FixedEnvironment {
    verdict: ContainerVerdict,
    probes: Mutex<usize>,
}

impl FixedEnvironment {
    pub(crate) fn new(containerized: bool) -> Self {
        let matched = if containerized {
            vec!["marker /.dockerenv".to_string()]
        } else {
            Vec::new()
        };
        Self {
            verdict: ContainerVerdict {
                containerized,
                matched,
            },
            probes: Mutex::new(0),
        }
    }

    pub(crate) fn probes(&self) -> usize {
        *self.probes.lock().expect("probe lock")
    }
}

impl EnvironmentProbe for FixedEnvironment {
    fn verdict(&self) -> ContainerVerdict {
        *self.probes.lock().expect("probe lock") += 1;
        self.verdict.clone()
    }
}

pub(crate) struct FakeEffects {
    pub(crate) runner: ScriptedRunner,
    pub(crate) importer: ScriptedImporter,
    pub(crate) environment: FixedEnvironment,
}

impl FakeEffects {
    pub(crate) fn new(outcomes: Vec<CommandOutcome>, imports: &[bool]) -> Self {
        Self {
            runner: ScriptedRunner::with(outcomes),
            importer: ScriptedImporter::with(imports),
            environment: FixedEnvironment::new(false),
        }
    }

    pub(crate) fn containerized(mut self) -> Self {
        self.environment = FixedEnvironment::new(true);
        self
    }
}

impl Effects for FakeEffects {
    fn runner(&self) -> &dyn CommandRunner {
        &self.runner
    }

    fn importer(&self) -> &dyn ImportProbe {
        &self.importer
    }

    fn environment(&self) -> &dyn EnvironmentProbe {
        &self.environment
    }
}

pub(crate) fn ok() -> CommandOutcome {
    CommandOutcome::exited(0, "Successfully installed", "")
}

pub(crate) fn failed(stderr: &str) -> CommandOutcome {
    CommandOutcome::exited(1, "", stderr)
}
