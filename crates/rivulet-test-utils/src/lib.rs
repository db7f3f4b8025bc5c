//! Test utilities for Rivulet development.
//!
//! Provides a tracing initializer, bounded-time probes for asserting that
//! a blocking call does (or does not) return, and reusable producer
//! fixtures in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::Once;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use rivulet_task::{current_task, Task};
use tracing_subscriber::EnvFilter;

/// Generous upper bound for "this should happen" waits.
pub const EVENTUALLY: Duration = Duration::from_secs(5);

/// Short window for "this should not happen" probes.
pub const QUIET: Duration = Duration::from_millis(100);

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `warn`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// A closure running on its own thread, whose result can be awaited with
/// a deadline.
///
/// The thread's [`Task`] is captured before the closure runs, so a test
/// can interrupt or unpark a probe that is blocked.
pub struct Probe<T> {
    task: Task,
    result: Receiver<T>,
}

impl<T: Send + 'static> Probe<T> {
    /// Spawn `f` on a fresh thread.
    pub fn spawn(f: impl FnOnce() -> T + Send + 'static) -> Self {
        let (task_tx, task_rx) = crossbeam_channel::bounded(1);
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let _ = task_tx.send(current_task());
            let _ = result_tx.send(f());
        });
        let task = task_rx
            .recv_timeout(EVENTUALLY)
            .expect("probe thread did not start");
        Self {
            task,
            result: result_rx,
        }
    }

    /// The probe thread's task.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Wait up to `timeout` for the closure to return.
    pub fn result_within(&self, timeout: Duration) -> Option<T> {
        match self.result.recv_timeout(timeout) {
            Ok(v) => Some(v),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => panic!("probe thread panicked"),
        }
    }

    /// Assert the closure is still blocked after [`QUIET`].
    pub fn assert_blocked(&self) {
        assert!(
            self.result.recv_timeout(QUIET).is_err(),
            "probe returned but was expected to block"
        );
    }

    /// Wait up to [`EVENTUALLY`] for the closure to return.
    pub fn join(&self) -> T {
        self.result_within(EVENTUALLY)
            .expect("probe did not return in time")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_until_sees_condition() {
        let start = Instant::now();
        assert!(wait_until(EVENTUALLY, || start.elapsed() > Duration::from_millis(5)));
        assert!(!wait_until(Duration::from_millis(5), || false));
    }

    #[test]
    fn probe_reports_result() {
        let probe = Probe::spawn(|| 41 + 1);
        assert_eq!(probe.join(), 42);
    }

    #[test]
    fn probe_detects_blocking() {
        let probe = Probe::spawn(|| current_task().park());
        probe.assert_blocked();
        probe.task().unpark();
        probe.join();
    }
}
