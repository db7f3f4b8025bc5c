//! Per-variable counters.
//!
//! [`VarMetrics`] is a point-in-time snapshot; the live counters are
//! atomics owned by the variable and updated with relaxed ordering.

/// Counters for a single dataflow variable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VarMetrics {
    /// Total values published via `set()`, including producer output.
    pub published: u64,
    /// Values evicted from the ring by newer values (displacement).
    pub displaced: u64,
    /// Individual dependent wake-ups issued by `set()` and teardown.
    pub dependent_wakes: u64,
    /// Completed producer computations.
    pub recomputations: u64,
    /// Producer tasks currently registered as dependents.
    pub dependents: usize,
    /// Consumer contexts currently held (one per reading task).
    pub consumers: usize,
}
