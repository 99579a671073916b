use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::package::PackageName;
use crate::search_path::{PythonPath, PYTHONPATH_ENV};

// `python -c` puts the working directory first on sys.path; drop it so only
// PYTHONPATH and site-packages decide whether the package resolves.
const IMPORT_SCRIPT: &str = r#"import importlib, json, sys
if sys.path and sys.path[0] == "":
    del sys.path[0]
name = sys.argv[1]
try:
    importlib.import_module(name)
except BaseException as exc:
    payload = {"ok": False, "error_type": type(exc).__name__, "message": str(exc)}
else:
    payload = {"ok": True}
sys.stdout.write("\n" + json.dumps(payload) + "\n")
"#;

/// Result of asking an interpreter to import a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ImportCheck {
    Importable,
    Failed { error_type: String, message: String },
}

impl ImportCheck {
    #[must_use]
    pub fn is_importable(&self) -> bool {
        matches!(self, Self::Importable)
    }

    fn failed(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            error_type: error_type.into(),
            message: message.into(),
        }
    }
}

#[derive(Deserialize)]
struct ImportPayload {
    ok: bool,
    #[serde(default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

/// Imports `package` in a fresh `python` process using `search_path` as
/// `PYTHONPATH`.
///
/// Every fault, including a missing interpreter, comes back as
/// [`ImportCheck::Failed`].
pub fn check_import(python: &str, package: &PackageName, search_path: &PythonPath) -> ImportCheck {
    let mut command = Command::new(python);
    command.arg("-c").arg(IMPORT_SCRIPT).arg(package.as_str());
    match search_path.to_env_value() {
        Some(value) => command.env(PYTHONPATH_ENV, value),
        None => command.env_remove(PYTHONPATH_ENV),
    };

    let output = match command.output() {
        Ok(output) => output,
        Err(err) => {
            debug!(%python, error = %err, "failed to launch interpreter for import probe");
            return ImportCheck::failed("LaunchError", format!("failed to run {python}: {err}"));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload = stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| serde_json::from_str::<ImportPayload>(line.trim()).ok());

    match payload {
        Some(payload) if payload.ok => ImportCheck::Importable,
        Some(payload) => {
            debug!(package = %package, error_type = %payload.error_type, "import probe failed");
            ImportCheck::failed(payload.error_type, payload.message)
        }
        None => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |code| code.to_string());
            ImportCheck::failed(
                "ProbeError",
                format!("import probe exited ({code}) without a result: {}", stderr.trim()),
            )
        }
    }
}
