//! Bounded broadcast ring for Rivulet.
//!
//! [`BroadcastRing`] keeps the last `capacity` published values. Publishing
//! never blocks: when the ring is full the oldest slot is overwritten.
//! Every reader holds its own [`Subscriber`] cursor and advances it
//! independently, so a slow reader skips displaced values instead of
//! stalling the publisher.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod ring;
pub mod subscriber;

pub use ring::{BroadcastRing, Publish};
pub use subscriber::Subscriber;
