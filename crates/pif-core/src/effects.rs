//! Seams between the orchestrator and the host.
//!
//! The orchestrator only talks to these traits; [`SystemEffects`] wires them
//! to the real shell, interpreter, and filesystem, and tests substitute
//! scripted doubles.

use std::path::Path;
use std::time::Duration;

use pif_python::{check_import, ImportCheck, PackageName, PythonPath};

use crate::config::{Config, EnvSnapshot};
use crate::environment::{ContainerProbe, ContainerVerdict};
use crate::orchestrator::CommandEnvironment;
use crate::process::{run_shell, CommandOutcome, Shell};

pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        command: &str,
        timeout: Duration,
        env: &CommandEnvironment,
        cwd: &Path,
    ) -> CommandOutcome;
}

pub trait ImportProbe: Send + Sync {
    fn check(&self, package: &PackageName, search_path: &PythonPath) -> ImportCheck;

    fn can_import(&self, package: &PackageName, search_path: &PythonPath) -> bool {
        self.check(package, search_path).is_importable()
    }
}

pub trait EnvironmentProbe: Send + Sync {
    fn verdict(&self) -> ContainerVerdict;

    fn detect_container(&self) -> bool {
        self.verdict().containerized
    }
}

pub trait Effects: Send + Sync {
    fn runner(&self) -> &dyn CommandRunner;
    fn importer(&self) -> &dyn ImportProbe;
    fn environment(&self) -> &dyn EnvironmentProbe;
}

pub struct SystemEffects {
    runner: ShellRunner,
    importer: InterpreterImportProbe,
    environment: ContainerProbe,
}

impl SystemEffects {
    #[must_use]
    pub fn new(config: &Config, env: EnvSnapshot, python: String) -> Self {
        Self {
            runner: ShellRunner {
                shell: Shell::default(),
                capture_limit: config.capture().max_bytes,
            },
            importer: InterpreterImportProbe { python },
            environment: ContainerProbe::new(env),
        }
    }
}

impl Effects for SystemEffects {
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

struct ShellRunner {
    shell: Shell,
    capture_limit: usize,
}

impl CommandRunner for ShellRunner {
    fn run(
        &self,
        command: &str,
        timeout: Duration,
        env: &CommandEnvironment,
        cwd: &Path,
    ) -> CommandOutcome {
        run_shell(&self.shell, command, timeout, env.vars(), cwd, self.capture_limit)
    }
}

struct InterpreterImportProbe {
    python: String,
}

impl ImportProbe for InterpreterImportProbe {
    fn check(&self, package: &PackageName, search_path: &PythonPath) -> ImportCheck {
        check_import(&self.python, package, search_path)
    }
}

impl EnvironmentProbe for ContainerProbe {
    fn verdict(&self) -> ContainerVerdict {
        ContainerProbe::verdict(self)
    }
}
