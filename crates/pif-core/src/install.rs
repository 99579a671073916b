use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pif_python::{detect_interpreter, PackageName, PythonPath};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{Config, EnvSnapshot};
use crate::effects::{Effects, SystemEffects};
use crate::environment::ContainerProbe;
use crate::orchestrator::{InstallObserver, InstallOrchestrator, InstallResult};
use crate::outcome::{ExecutionOutcome, InstallUserError};
use crate::tiers::{default_tiers, PATH_MUTATION};

pub const EXHAUSTED_HINT: &str = "Try running the commands manually or check for dependency issues";
pub const TEMPORARY_NOTE: &str =
    "This installation is temporary; add the project directory to PYTHONPATH to keep it";

#[derive(Clone, Debug, Default)]
pub struct InstallRequest {
    pub package: String,
    pub project_dir: Option<PathBuf>,
    pub python: Option<String>,
    pub dry_run: bool,
}

/// Installs the package from the project directory, falling back tier by
/// tier until an import of it succeeds.
///
/// # Errors
///
/// Returns an [`InstallUserError`] for an invalid package name, a missing
/// project directory, or when no interpreter can be found, and a plain error
/// when the working directory cannot be determined.
pub fn install_package(
    request: &InstallRequest,
    observer: &dyn InstallObserver,
) -> Result<ExecutionOutcome> {
    let snapshot = EnvSnapshot::capture();
    let config = Config::from_snapshot(&snapshot);
    let package = parse_package(&request.package)?;
    let project_dir = resolve_project_dir(request.project_dir.as_deref())?;

    if request.dry_run {
        let probe = ContainerProbe::new(snapshot);
        return Ok(plan_outcome(&package, &project_dir, &probe));
    }

    let explicit = request
        .python
        .as_deref()
        .or(config.python().interpreter.as_deref());
    let python = detect_interpreter(explicit).map_err(|err| {
        InstallUserError::new(
            err.to_string(),
            json!({
                "reason": "missing_interpreter",
                "hint": "Install Python 3 or pass --python <path>",
            }),
        )
    })?;
    debug!(%python, package = %package, dir = %project_dir.display(), "starting install");

    let effects = SystemEffects::new(&config, snapshot, python.clone());
    let mut outcome = execute_install(
        &effects,
        package,
        project_dir,
        config.python().search_path.clone(),
        observer,
    );
    outcome.details["python"] = Value::String(python);
    Ok(outcome)
}

/// Runs the orchestrator against `effects` and shapes its report.
pub fn execute_install(
    effects: &dyn Effects,
    package: PackageName,
    project_dir: PathBuf,
    search_path: PythonPath,
    observer: &dyn InstallObserver,
) -> ExecutionOutcome {
    let name = package.to_string();
    let report = InstallOrchestrator::new(effects, package, project_dir, search_path)
        .with_observer(observer)
        .run();
    let mut details = serde_json::to_value(&report).unwrap_or_default();

    match &report.result {
        InstallResult::Verified(tier) if tier == PATH_MUTATION => {
            details["note"] = Value::String(TEMPORARY_NOTE.to_string());
            if let Some(export) = report.search_path.export_line() {
                details["export"] = Value::String(export);
            }
            ExecutionOutcome::success(
                format!("{name} is importable via {tier} (temporary)"),
                details,
            )
        }
        InstallResult::Verified(tier) => {
            ExecutionOutcome::success(format!("{name} installed via {tier}"), details)
        }
        InstallResult::AllFailed => {
            details["hint"] = Value::String(EXHAUSTED_HINT.to_string());
            ExecutionOutcome::failure(
                format!("all installation methods failed for {name}"),
                details,
            )
        }
    }
}

fn parse_package(raw: &str) -> Result<PackageName> {
    PackageName::parse(raw).map_err(|err| {
        InstallUserError::new(
            err.to_string(),
            json!({
                "reason": "invalid_package",
                "package": raw,
                "hint": "Pass the importable module name, e.g. `my_package`",
            }),
        )
        .into()
    })
}

fn resolve_project_dir(requested: Option<&Path>) -> Result<PathBuf> {
    let cwd = env::current_dir().context("unable to determine the current directory")?;
    let dir = match requested {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => cwd.join(path),
        None => cwd,
    };
    if !dir.is_dir() {
        return Err(InstallUserError::new(
            format!("project directory {} does not exist", dir.display()),
            json!({
                "reason": "missing_project_dir",
                "project_dir": dir.display().to_string(),
                "hint": "Pass --project-dir pointing at the package source",
            }),
        )
        .into());
    }
    Ok(dir)
}

fn plan_outcome(
    package: &PackageName,
    project_dir: &Path,
    probe: &ContainerProbe,
) -> ExecutionOutcome {
    let verdict = probe.verdict();
    let tiers = default_tiers();
    let plan: Vec<String> = tiers.iter().map(|tier| tier.describe()).collect();
    ExecutionOutcome::success(
        format!("dry run: {} methods planned for {package}", tiers.len()),
        json!({
            "dry_run": true,
            "package": package.as_str(),
            "project_dir": project_dir,
            "container": verdict,
            "tiers": tiers,
            "plan": plan,
        }),
    )
}
