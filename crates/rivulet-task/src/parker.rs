//! Permit-based thread parking.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A single-permit parking primitive.
///
/// [`unpark`](Parker::unpark) stores a permit and wakes the parked thread,
/// if any. [`park`](Parker::park) consumes the permit, blocking until one
/// is available. Unlike `std::thread::park`, this never returns spuriously.
#[derive(Debug, Default)]
pub struct Parker {
    permit: Mutex<bool>,
    cvar: Condvar,
}

// Compile-time assertion: Parker must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Parker>();
};

impl Parker {
    /// Create a parker with no permit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until a permit is available, then consume it.
    pub fn park(&self) {
        let mut permit = self.permit.lock().unwrap_or_else(PoisonError::into_inner);
        while !*permit {
            permit = self
                .cvar
                .wait(permit)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *permit = false;
    }

    /// Block until a permit is available or `timeout` elapses.
    ///
    /// Returns `true` if a permit was consumed.
    pub fn park_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut permit = self.permit.lock().unwrap_or_else(PoisonError::into_inner);
        while !*permit {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            permit = self
                .cvar
                .wait_timeout(permit, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *permit = false;
        true
    }

    /// Make a permit available and wake the parked thread.
    pub fn unpark(&self) {
        let mut permit = self.permit.lock().unwrap_or_else(PoisonError::into_inner);
        *permit = true;
        drop(permit);
        self.cvar.notify_one();
    }
}
