//! Rivulet: dataflow variables for threaded Rust.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Rivulet sub-crates. For most users, adding `rivulet` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use rivulet::prelude::*;
//!
//! let celsius: Var<f64> = Var::new();
//! let input = celsius.clone();
//! let fahrenheit: Var<f64> = Var::producing(move || {
//!     Ok(input.get()?.map(|c| c * 9.0 / 5.0 + 32.0))
//! })
//! .unwrap();
//!
//! celsius.set(100.0);
//! assert_eq!(fahrenheit.get().unwrap(), Some(212.0));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `rivulet-core` | IDs, errors, configuration, metrics |
//! | [`task`] | `rivulet-task` | Tasks, parking, schedulers |
//! | [`channel`] | `rivulet-channel` | Displacing broadcast ring and cursors |
//! | [`var`] | `rivulet-var` | `Var`, its builder, and producer handles |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// IDs, errors, configuration, and metrics (`rivulet-core`).
pub use rivulet_core as types;

/// Tasks, parking, and schedulers (`rivulet-task`).
///
/// A producer runs on a [`task::Scheduler`]; the default is a
/// thread-per-task [`task::ThreadScheduler`].
pub use rivulet_task as task;

/// Displacing broadcast ring with per-reader cursors (`rivulet-channel`).
pub use rivulet_channel as channel;

/// Dataflow variables (`rivulet-var`).
pub use rivulet_var as var;

/// Common imports for typical Rivulet usage.
///
/// ```rust
/// use rivulet::prelude::*;
/// ```
pub mod prelude {
    // Variables
    pub use rivulet_var::{ProducerExit, ProducerHandle, Var, VarBuilder};

    // Errors
    pub use rivulet_core::{ProducerError, VarError};

    // Configuration and metrics
    pub use rivulet_core::{SchedulerConfig, VarConfig, VarMetrics};

    // Scheduling
    pub use rivulet_task::{current_task, Scheduler, Task, ThreadScheduler};
}
