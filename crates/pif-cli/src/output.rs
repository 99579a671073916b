use std::cell::RefCell;

use color_eyre::Result;
use pif_core::progress::ProgressReporter;
use pif_core::{
    CommandEnvironment, CommandStatus, ContainerVerdict, ExecutionOutcome, InstallObserver,
    InstallTier, InstallUserError, TierAttempt, TierDisposition,
};
use serde_json::Value;

use crate::style::Style;

#[derive(Clone, Copy, Debug)]
pub struct OutputOptions {
    pub quiet: bool,
    pub json: bool,
}

impl OutputOptions {
    pub fn human(self) -> bool {
        !(self.quiet || self.json)
    }
}

/// Prints one block per tier as the orchestrator reports it.
pub struct HumanObserver<'a> {
    style: &'a Style,
    progress: bool,
    spinner: RefCell<Option<ProgressReporter>>,
}

impl<'a> HumanObserver<'a> {
    pub fn new(style: &'a Style, progress: bool) -> Self {
        Self {
            style,
            progress,
            spinner: RefCell::new(None),
        }
    }

    fn stop_spinner(&self) {
        if let Some(spinner) = self.spinner.borrow_mut().take() {
            spinner.finish();
        }
    }
}

impl InstallObserver for HumanObserver<'_> {
    fn container_detected(&self, verdict: &ContainerVerdict, env: &CommandEnvironment) {
        if !verdict.containerized {
            return;
        }
        println!("🐳 Detected container environment");
        println!(
            "{}",
            self.style
                .detail(&format!("   signals: {}", verdict.matched.join(", ")))
        );
        for (key, value) in env.vars() {
            println!("{}", self.style.detail(&format!("   {key}={value}")));
        }
    }

    fn tier_started(&self, index: usize, tier: &InstallTier) {
        println!();
        println!("{}", self.style.method(index + 1, &tier.describe()));
        let spinner = ProgressReporter::spinner(tier.label(), self.progress);
        *self.spinner.borrow_mut() = Some(spinner);
    }

    fn tier_finished(&self, _index: usize, tier: &InstallTier, attempt: &TierAttempt) {
        self.stop_spinner();
        let diagnostic = attempt.diagnostic.as_deref().unwrap_or_default();
        match (&attempt.disposition, tier) {
            (TierDisposition::Verified, InstallTier::Command { command, .. }) => {
                let installed = format!("Successfully installed with {command}");
                println!("{}", self.style.success(&installed));
                println!("{}", self.style.success("Package import successful"));
            }
            (TierDisposition::Verified, InstallTier::PathMutation { .. }) => {
                println!("{}", self.style.success("Package available via PYTHONPATH"));
            }
            (TierDisposition::ImportFailed { .. }, InstallTier::Command { command, .. }) => {
                let installed = format!("Successfully installed with {command}");
                println!("{}", self.style.success(&installed));
                let failed = format!("Package import failed: {diagnostic}");
                println!("{}", self.style.failure(&failed));
            }
            (TierDisposition::ImportFailed { .. }, InstallTier::PathMutation { .. }) => {
                let failed = format!("Package import failed: {diagnostic}");
                println!("{}", self.style.failure(&failed));
            }
            (TierDisposition::CommandFailed { .. } | TierDisposition::TimedOut { .. }, _) => {
                print_failure(self.style, diagnostic);
            }
        }
    }
}

impl Drop for HumanObserver<'_> {
    fn drop(&mut self) {
        self.stop_spinner();
    }
}

fn print_failure(style: &Style, diagnostic: &str) {
    let mut lines = diagnostic.lines();
    let first = lines.next().unwrap_or_default();
    println!("{}", style.failure(&format!("Failed: {first}")));
    for line in lines {
        println!("{}", style.detail(&format!("   {line}")));
    }
}

pub fn print_banner(style: &Style, package: &str) {
    println!("{}", style.banner(&format!("🚀 pif: installing {package}")));
    println!("{}", "=".repeat(50));
}

/// Turns errors from the core into outcomes, keeping user errors distinct.
pub fn core_call<F>(action: F) -> ExecutionOutcome
where
    F: FnOnce() -> anyhow::Result<ExecutionOutcome>,
{
    match action() {
        Ok(outcome) => outcome,
        Err(err) => match err.downcast::<InstallUserError>() {
            Ok(user) => ExecutionOutcome::from(user),
            Err(err) => {
                let issues: Vec<String> =
                    err.chain().map(std::string::ToString::to_string).collect();
                ExecutionOutcome::failure(
                    err.to_string(),
                    serde_json::json!({
                        "reason": "internal_error",
                        "error": err.to_string(),
                        "issues": issues,
                        "hint": "Re-run with `-vv` for more detail",
                    }),
                )
            }
        },
    }
}

pub fn emit_output(
    opts: OutputOptions,
    style: &Style,
    outcome: &ExecutionOutcome,
) -> Result<i32> {
    let code = outcome.exit_code();

    if opts.json {
        let payload = pif_core::to_json_response(outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    let message = pif_core::format_status_message(&outcome.message);
    if outcome.status == CommandStatus::UserError {
        eprintln!("{}", style.status(&outcome.status, &message));
        if let Some(hint) = outcome.hint() {
            eprintln!("{}", style.hint(hint));
        }
        return Ok(code);
    }
    if opts.quiet {
        return Ok(code);
    }

    if is_dry_run(&outcome.details) {
        print_plan(style, &outcome.details);
    }
    println!();
    println!("{}", style.status(&outcome.status, &message));
    if let Some(note) = outcome.details.get("note").and_then(Value::as_str) {
        println!("{}", style.hint(&format!("Note: {note}")));
    }
    if let Some(export) = outcome.details.get("export").and_then(Value::as_str) {
        println!("{}", style.info(&format!("   {export}")));
    }
    if let Some(hint) = outcome.hint() {
        println!("{}", style.hint(hint));
    }
    Ok(code)
}

fn is_dry_run(details: &Value) -> bool {
    details
        .get("dry_run")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn print_plan(style: &Style, details: &Value) {
    let containerized = details
        .pointer("/container/containerized")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if containerized {
        println!("🐳 Detected container environment");
    } else {
        println!("{}", style.detail("No container environment detected"));
    }
    let plan = details.get("plan").and_then(Value::as_array);
    for (index, step) in plan.into_iter().flatten().enumerate() {
        if let Some(step) = step.as_str() {
            println!("{}", style.method(index + 1, step));
        }
    }
}
