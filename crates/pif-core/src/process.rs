use std::{
    collections::VecDeque,
    io::{self, Read},
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
    sync::mpsc::{self, Receiver},
    thread,
    time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
// Lets drains finish after a kill even when the shell exited at the deadline.
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// How a command run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CommandExit {
    Exited { code: i32 },
    TimedOut { after_secs: u64 },
    SpawnFailed,
}

/// Captured result of one shell command. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit: CommandExit,
}

impl CommandOutcome {
    #[must_use]
    pub fn exited(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            succeeded: code == 0,
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit: CommandExit::Exited { code },
        }
    }

    #[must_use]
    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: format!("command timed out after {}", describe_timeout(timeout)),
            exit: CommandExit::TimedOut {
                after_secs: timeout.as_secs(),
            },
        }
    }

    #[must_use]
    pub fn spawn_failed(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: message.into(),
            exit: CommandExit::SpawnFailed,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.exit, CommandExit::TimedOut { .. })
    }
}

/// `1 second`, `60 seconds`, or `250 ms` for sub-second bounds.
#[must_use]
pub fn describe_timeout(timeout: Duration) -> String {
    match timeout.as_secs() {
        0 => format!("{} ms", timeout.as_millis()),
        1 => "1 second".to_string(),
        secs => format!("{secs} seconds"),
    }
}

/// The host shell used to interpret command strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    program: String,
    flag: String,
}

impl Shell {
    #[must_use]
    pub fn new(program: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            flag: flag.into(),
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        if cfg!(windows) {
            Self::new("cmd", "/C")
        } else {
            Self::new("/bin/sh", "-c")
        }
    }
}

/// Run `command` through `shell`, waiting at most `timeout`.
///
/// Never returns an error: spawn and wait faults become
/// [`CommandExit::SpawnFailed`], an expired deadline becomes
/// [`CommandExit::TimedOut`]. The whole process group is killed once the
/// shell is gone or the deadline passes, and output drains still running at
/// the deadline are abandoned, so a background grandchild holding the pipes
/// cannot stretch the call past its bound.
pub fn run_shell(
    shell: &Shell,
    command: &str,
    timeout: Duration,
    envs: &[(String, String)],
    cwd: &Path,
    capture_limit: usize,
) -> CommandOutcome {
    let mut cmd = Command::new(&shell.program);
    cmd.arg(&shell.flag).arg(command);
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.current_dir(cwd);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!(%command, cwd = %cwd.display(), timeout_ms = timeout.as_millis(), "spawning");
    let deadline = Instant::now() + timeout;
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            return CommandOutcome::spawn_failed(format!(
                "failed to start `{command}` via {}: {err}",
                shell.program
            ));
        }
    };

    let stdout = child.stdout.take().map(|pipe| drain(pipe, capture_limit));
    let stderr = child.stderr.take().map(|pipe| drain(pipe, capture_limit));

    match wait_with_deadline(&mut child, deadline) {
        Ok(Some(status)) => {
            let code = status.code().unwrap_or(-1);
            kill_group(&child);
            CommandOutcome::exited(code, collect(stdout, deadline), collect(stderr, deadline))
        }
        Ok(None) => {
            warn!(%command, "timed out after {}; terminating", describe_timeout(timeout));
            terminate(&mut child);
            CommandOutcome::timed_out(timeout)
        }
        Err(err) => {
            terminate(&mut child);
            CommandOutcome::spawn_failed(format!("failed to wait for `{command}`: {err}"))
        }
    }
}

fn wait_with_deadline(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

// The child leads its own process group, so this reaches the shell and
// everything it started, including jobs it left in the background.
#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(child.id()) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => debug!(pid = raw, error = %err, "killpg failed"),
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

fn terminate(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

type Drain = Receiver<io::Result<(String, bool)>>;

fn drain(pipe: impl Read + Send + 'static, limit: usize) -> Drain {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let _ = sender.send(read_to_string_limited(pipe, limit));
    });
    receiver
}

fn collect(receiver: Option<Drain>, deadline: Instant) -> String {
    let Some(receiver) = receiver else {
        return String::new();
    };
    let wait = deadline
        .saturating_duration_since(Instant::now())
        .max(DRAIN_GRACE);
    match receiver.recv_timeout(wait) {
        Ok(Ok((mut text, truncated))) => {
            if truncated {
                text.push_str("\n[...truncated...]\n");
            }
            text
        }
        Ok(Err(err)) => {
            debug!(error = %err, "failed to read command output");
            String::new()
        }
        Err(err) => {
            debug!(error = %err, "abandoning output drain");
            String::new()
        }
    }
}

fn read_to_string_limited(mut reader: impl Read, limit: usize) -> io::Result<(String, bool)> {
    let mut tail = VecDeque::new();
    let mut truncated = false;
    let mut chunk = [0u8; 8192];
    loop {
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        keep_tail(&mut tail, &chunk[..read], limit, &mut truncated);
    }
    let mut bytes = Vec::from(tail);
    if truncated {
        // Never start the kept tail in the middle of a UTF-8 sequence.
        let partial = bytes
            .iter()
            .take(3)
            .take_while(|byte| (**byte & 0xC0) == 0x80)
            .count();
        bytes.drain(..partial);
    }
    Ok((String::from_utf8_lossy(&bytes).into_owned(), truncated))
}

// Installers print the useful part of a failure last, so the tail is kept.
fn keep_tail(tail: &mut VecDeque<u8>, chunk: &[u8], limit: usize, truncated: &mut bool) {
    let chunk = if chunk.len() > limit {
        *truncated = true;
        &chunk[chunk.len() - limit..]
    } else {
        chunk
    };
    let overflow = (tail.len() + chunk.len()).saturating_sub(limit);
    if overflow > 0 {
        *truncated = true;
        tail.drain(..overflow);
    }
    tail.extend(chunk);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_CAPTURE_BYTES;

    fn sh(command: &str, timeout: Duration) -> CommandOutcome {
        run_shell(
            &Shell::default(),
            command,
            timeout,
            &[],
            Path::new("."),
            DEFAULT_MAX_CAPTURE_BYTES,
        )
    }

    #[cfg(unix)]
    #[test]
    fn captures_streams_and_exit_status() {
        let outcome = sh("printf out && printf err >&2; exit 7", Duration::from_secs(10));
        assert!(!outcome.succeeded);
        assert_eq!(outcome.exit, CommandExit::Exited { code: 7 });
        assert_eq!(outcome.stdout, "out");
        assert_eq!(outcome.stderr, "err");

        let ok = sh("true", Duration::from_secs(10));
        assert!(ok.succeeded);
        assert_eq!(ok.exit, CommandExit::Exited { code: 0 });
    }

    #[cfg(unix)]
    #[test]
    fn timeout_returns_promptly_with_diagnostic() {
        let started = Instant::now();
        let outcome = sh("sleep 5", Duration::from_secs(1));
        let elapsed = started.elapsed();
        assert!(!outcome.succeeded);
        assert!(outcome.is_timeout());
        assert!(
            outcome.stderr.contains("1 second"),
            "diagnostic should name the bound: {}",
            outcome.stderr
        );
        assert!(
            elapsed < Duration::from_secs(3),
            "run should stop near the 1s bound, took {elapsed:?}"
        );
    }

    #[cfg(unix)]
    #[test]
    fn unknown_command_is_a_plain_failure() {
        let outcome = sh("pif-definitely-not-a-command-0x1", Duration::from_secs(10));
        assert!(!outcome.succeeded);
        assert_eq!(outcome.exit, CommandExit::Exited { code: 127 });
        assert!(!outcome.stderr.is_empty());
    }

    #[test]
    fn missing_shell_becomes_spawn_failure() {
        let shell = Shell::new("/nonexistent/pif/shell", "-c");
        let outcome = run_shell(
            &shell,
            "true",
            Duration::from_secs(1),
            &[],
            Path::new("."),
            DEFAULT_MAX_CAPTURE_BYTES,
        );
        assert!(!outcome.succeeded);
        assert_eq!(outcome.exit, CommandExit::SpawnFailed);
        assert!(outcome.stderr.contains("/nonexistent/pif/shell"));
    }

    #[cfg(unix)]
    #[test]
    fn passes_explicit_environment_and_working_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = run_shell(
            &Shell::default(),
            "printf '%s|%s' \"$PIP_NO_CACHE_DIR\" \"$(basename \"$PWD\")\"",
            Duration::from_secs(10),
            &[("PIP_NO_CACHE_DIR".to_string(), "1".to_string())],
            temp.path(),
            DEFAULT_MAX_CAPTURE_BYTES,
        );
        let expected_dir = temp
            .path()
            .file_name()
            .expect("dir name")
            .to_string_lossy()
            .to_string();
        assert_eq!(outcome.stdout, format!("1|{expected_dir}"));
    }

    #[cfg(unix)]
    #[test]
    fn large_output_keeps_the_tail() {
        let outcome = run_shell(
            &Shell::default(),
            "head -c 5000 /dev/zero | tr '\\0' a; printf END",
            Duration::from_secs(10),
            &[],
            Path::new("."),
            1024,
        );
        assert!(outcome.stdout.contains("[...truncated...]"));
        assert!(outcome.stdout.trim_end().ends_with("[...truncated...]"));
        assert!(outcome.stdout.contains("END"));
        assert!(outcome.stdout.len() <= 1024 + 32);
    }

    #[cfg(unix)]
    #[test]
    fn background_job_cannot_hold_the_call_past_its_bound() {
        let started = Instant::now();
        let outcome = sh("sleep 6 & printf done; exit 0", Duration::from_secs(1));
        let elapsed = started.elapsed();
        assert!(outcome.succeeded, "{outcome:?}");
        assert_eq!(outcome.exit, CommandExit::Exited { code: 0 });
        assert_eq!(outcome.stdout, "done");
        assert!(
            elapsed < Duration::from_secs(3),
            "background job kept the run going for {elapsed:?}"
        );
    }

    #[test]
    fn truncated_tail_starts_on_a_character_boundary() {
        // Ten bytes of two-byte characters; a five byte tail cuts one in half.
        let (text, truncated) =
            read_to_string_limited(io::Cursor::new("ééééé".as_bytes()), 5).expect("read");
        assert!(truncated);
        assert_eq!(text, "éé");
        assert!(!text.contains('\u{FFFD}'));
    }

    #[test]
    fn tail_survives_many_small_chunks() {
        let mut tail = VecDeque::new();
        let mut truncated = false;
        for index in 0..10_000u32 {
            keep_tail(&mut tail, index.to_string().as_bytes(), 4, &mut truncated);
        }
        assert!(truncated);
        assert_eq!(Vec::from(tail), b"9999");
    }

    #[test]
    fn timeouts_are_described_in_human_units() {
        assert_eq!(describe_timeout(Duration::from_secs(1)), "1 second");
        assert_eq!(describe_timeout(Duration::from_secs(60)), "60 seconds");
        assert_eq!(describe_timeout(Duration::from_millis(250)), "250 ms");
    }
}
