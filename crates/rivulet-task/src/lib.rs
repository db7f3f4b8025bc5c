//! Task substrate for Rivulet.
//!
//! A [`Task`] is the unit a dataflow variable reasons about: something that
//! can be identified, parked, unparked, and interrupted. Producer tasks are
//! spawned on a [`Scheduler`]; every other thread that touches a variable is
//! given a plain task identity lazily by [`current_task`].
//!
//! # Parking
//!
//! ```text
//! waiter                         waker
//!   |                              |
//!   |-- register in waiter list -->|
//!   |-- re-check condition         |
//!   |-- task.park() ...            |-- task.unpark()  (sets permit)
//!   |<- returns, permit consumed   |
//! ```
//!
//! An `unpark` that races ahead of the matching `park` is never lost: the
//! permit is stored and the next `park` returns immediately. Redundant
//! unparks coalesce into a single permit.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod parker;
pub mod scheduler;
pub mod task;

pub use parker::Parker;
pub use scheduler::{default_scheduler, Scheduler, TaskSpawn, ThreadScheduler};
pub use task::{current_task, Task, TaskKind, WeakTask};
