//! Core types for Rivulet dataflow variables.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! identifiers, error taxonomy, configuration structs, and metrics
//! snapshots shared by the task substrate, the broadcast ring, and the
//! variable implementation.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod id;
pub mod metrics;

pub use config::{SchedulerConfig, VarConfig, MAX_HISTORY};
pub use error::{ChannelError, CloseCause, ProducerError, SpawnError, VarError};
pub use id::{TaskId, VarId};
pub use metrics::VarMetrics;
