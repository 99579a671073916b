#![deny(clippy::all)]

mod config;
mod effects;
mod environment;
mod install;
mod orchestrator;
mod outcome;
mod process;
pub mod progress;
mod tiers;

#[cfg(test)]
mod testing;

pub use config::{CaptureConfig, Config, EnvSnapshot, ProgressConfig, PythonConfig};
pub use effects::{CommandRunner, Effects, EnvironmentProbe, ImportProbe, SystemEffects};
pub use environment::{ContainerProbe, ContainerVerdict, EnvironmentSignal, SignalReading};
pub use install::{
    execute_install, install_package, InstallRequest, EXHAUSTED_HINT, TEMPORARY_NOTE,
};
pub use orchestrator::{
    CommandEnvironment, InstallObserver, InstallOrchestrator, InstallReport, InstallResult,
    NoopObserver, TierAttempt, TierDisposition,
};
pub use outcome::{
    format_status_message, to_json_response, CommandStatus, ExecutionOutcome, InstallUserError,
};
pub use process::{describe_timeout, run_shell, CommandExit, CommandOutcome, Shell};
pub use tiers::{default_tiers, InstallTier};
