#![allow(dead_code)]

use std::{
    env, fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use assert_cmd::assert::Assert;
use serde_json::Value;
use tempfile::TempDir;

pub const PACKAGE: &str = "sample_pkg";

/// Absolute path of a working interpreter, so later `PATH` shims cannot
/// shadow it.
pub fn find_python() -> Option<String> {
    let candidates = [
        env::var("PYTHON").ok(),
        Some("python3".to_string()),
        Some("python".to_string()),
    ];
    for candidate in candidates.into_iter().flatten() {
        let output = Command::new(&candidate)
            .args(["-c", "import sys; print(sys.executable)"])
            .stderr(Stdio::null())
            .output();
        if let Ok(output) = output {
            let executable = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if output.status.success() && !executable.is_empty() {
                return Some(executable);
            }
        }
    }
    None
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

pub fn stdout(assert: &Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).to_string()
}

pub fn stderr(assert: &Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stderr).to_string()
}

/// A scratch project plus a `bin/` of installer shims and a `site/` dir that
/// stands in for site-packages.
pub struct Sandbox {
    pub temp: TempDir,
    pub project: PathBuf,
    pub bin: PathBuf,
    pub site: PathBuf,
    pub log: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let temp = tempfile::Builder::new()
            .prefix("pif-cli")
            .tempdir()
            .expect("tempdir");
        let project = temp.path().join("project");
        let bin = temp.path().join("bin");
        let site = temp.path().join("site");
        for dir in [&project, &bin, &site] {
            fs::create_dir_all(dir).expect("create dir");
        }
        let log = temp.path().join("calls.log");
        fs::write(&log, "").expect("create log");
        Self {
            temp,
            project,
            bin,
            site,
            log,
        }
    }

    /// Writes an importable `sample_pkg` into the project directory.
    pub fn with_package_source(self) -> Self {
        let pkg = self.project.join(PACKAGE);
        fs::create_dir_all(&pkg).expect("package dir");
        fs::write(pkg.join("__init__.py"), "VALUE = 42\n").expect("write init");
        self
    }

    pub fn write_shim(&self, name: &str, body: &str) {
        let path = self.bin.join(name);
        let script = format!("#!/bin/sh\necho \"{name} $*\" >> \"$PIF_TEST_LOG\"\n{body}\n");
        fs::write(&path, script).expect("write shim");
        make_executable(&path);
    }

    pub fn path_env(&self) -> String {
        let inherited = env::var("PATH").unwrap_or_default();
        format!("{}:{inherited}", self.bin.display())
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .expect("read log")
            .lines()
            .map(ToString::to_string)
            .collect()
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}
