//! Dataflow variables.
//!
//! A [`Var`] is a cell whose value stream is fed either by explicit
//! [`Var::set`] calls or by one background producer computation, and read
//! by any number of tasks, each through its own cursor into a bounded
//! history of recent values.
//!
//! # Architecture
//!
//! ```text
//! writer / producer task          Var<T>                     reader tasks
//!     |                             |                             |
//!     |--set(v)-------------------->| ring.publish(slot)          |
//!     |                             | dependents.wake_all() ----> producer tasks re-run
//!     |                             |                             |
//!     |                             |<--------------get()---------|
//!     |                             | consumers[task] cursor      |
//!     |                             |   no cache: receive()       |
//!     |                             |   cached:   try_receive()   |
//! ```
//!
//! A producer task reading another variable inside its computation is
//! registered as that variable's dependent, so every upstream `set` wakes
//! it to recompute. Producers hold only a weak handle to their own
//! variable and exit once it is dropped.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod consumer;
mod dependents;
pub mod producer;
pub mod var;

pub use producer::{ProducerExit, ProducerHandle};
pub use var::{Var, VarBuilder};
