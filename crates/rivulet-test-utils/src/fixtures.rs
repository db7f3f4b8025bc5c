//! Reusable producer fixtures.
//!
//! - [`Counter`]: counts invocations; the producer returns the count.
//! - [`fail_after`]: succeeds N times, then fails deterministically.
//! - [`panic_after`]: succeeds N times, then panics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rivulet_core::ProducerError;

/// Shared invocation counter for producer closures.
#[derive(Clone, Debug, Default)]
pub struct Counter(Arc<AtomicU64>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the new count.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// A producer that returns `1, 2, 3, ...` on successive calls.
    pub fn producer(&self) -> impl FnMut() -> Result<u64, ProducerError> + Send + 'static {
        let counter = self.clone();
        move || Ok(counter.bump())
    }
}

/// A producer that returns its call index for `successes` calls, then
/// fails with `reason` on every call after.
pub fn fail_after(
    successes: u64,
    reason: &str,
) -> impl FnMut() -> Result<u64, ProducerError> + Send + 'static {
    let reason = reason.to_string();
    let mut calls = 0u64;
    move || {
        calls += 1;
        if calls > successes {
            Err(ProducerError::failed(reason.clone()))
        } else {
            Ok(calls)
        }
    }
}

/// A producer that returns its call index for `successes` calls, then
/// panics with `message`.
pub fn panic_after(
    successes: u64,
    message: &'static str,
) -> impl FnMut() -> Result<u64, ProducerError> + Send + 'static {
    let mut calls = 0u64;
    move || {
        calls += 1;
        if calls > successes {
            panic!("{message}");
        }
        Ok(calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_producer_counts() {
        let c = Counter::new();
        let mut p = c.producer();
        assert_eq!(p(), Ok(1));
        assert_eq!(p(), Ok(2));
        assert_eq!(c.get(), 2);
    }

    #[test]
    fn fail_after_fails_on_schedule() {
        let mut p = fail_after(1, "nope");
        assert_eq!(p(), Ok(1));
        assert_eq!(p(), Err(ProducerError::failed("nope")));
    }
}
