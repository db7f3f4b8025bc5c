//! Strongly-typed identifiers for tasks and variables.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique [`TaskId`] allocation.
static TASK_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Counter for unique [`VarId`] allocation.
static VAR_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies a task (a scheduled producer or any thread that reads a
/// variable).
///
/// Allocated from a monotonic atomic counter via [`TaskId::next`]. IDs are
/// never reused within a process, so a table keyed by `TaskId` cannot
/// confuse an exited task with a newly created one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Allocate a fresh, unique task ID. Thread-safe.
    pub fn next() -> Self {
        Self(TASK_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Identifies a dataflow variable.
///
/// Used as the key of a producer task's read set, where variables of
/// different value types live side by side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u64);

impl VarId {
    /// Allocate a fresh, unique variable ID. Thread-safe.
    pub fn next() -> Self {
        Self(VAR_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var#{}", self.0)
    }
}
