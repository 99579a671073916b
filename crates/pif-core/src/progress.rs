use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::ProgressConfig;

/// `PIF_PROGRESS` wins; otherwise spin only when stderr is a terminal.
#[must_use]
pub fn progress_enabled(config: &ProgressConfig) -> bool {
    config
        .enabled
        .unwrap_or_else(|| io::stderr().is_terminal())
}

/// A one-line stderr spinner that runs while a tier command is in flight.
pub struct ProgressReporter {
    stop: Option<Arc<AtomicBool>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ProgressReporter {
    #[must_use]
    pub fn spinner(label: impl Into<String>, enabled: bool) -> Self {
        if !enabled {
            return Self::disabled();
        }

        let label = label.into();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::spawn(move || ProgressReporter::run(&label, &thread_stop));

        Self {
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            stop: None,
            handle: None,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.handle.is_some()
    }

    pub fn finish(mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, AtomicOrdering::Relaxed);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            let _ = io::stderr().write_all(b"\r\x1b[2K");
            let _ = io::stderr().flush();
        }
    }

    fn run(label: &str, stop: &Arc<AtomicBool>) {
        const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        let mut idx = 0;
        while !stop.load(AtomicOrdering::Relaxed) {
            let frame = FRAMES[idx % FRAMES.len()];
            idx += 1;
            let line = format!("\r\x1b[2Kpif ▸ {label} {frame}");
            let _ = io::stderr().write_all(line.as_bytes());
            let _ = io::stderr().flush();
            thread::sleep(Duration::from_millis(80));
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.clear();
    }
}
