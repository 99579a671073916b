use anyhow::{anyhow, bail, Result};
use which::which;

pub const RUNTIME_PYTHON_ENV: &str = "PIF_RUNTIME_PYTHON";

/// Detects the Python interpreter used for import verification.
///
/// An explicit path (from `--python` or `PIF_RUNTIME_PYTHON`) wins; otherwise
/// `python3` and then `python` are looked up on `PATH`.
///
/// # Errors
///
/// Returns an error when no interpreter can be found or the detected path is
/// not valid UTF-8.
pub fn detect_interpreter(explicit: Option<&str>) -> Result<String> {
    if let Some(explicit) = explicit.filter(|value| !value.trim().is_empty()) {
        return Ok(explicit.to_string());
    }

    for candidate in ["python3", "python"] {
        if let Ok(path) = which(candidate) {
            return path
                .into_os_string()
                .into_string()
                .map_err(|_| anyhow!("non-utf8 path"));
        }
    }

    bail!("no python interpreter found; pass --python or set {RUNTIME_PYTHON_ENV}")
}
