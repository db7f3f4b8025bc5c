//! Error types for Rivulet, organized by subsystem: the broadcast ring,
//! the task scheduler, producer computations, and the variable API.
//!
//! The variable API exposes a two-tier taxonomy. Recognized failures
//! ([`VarError::InvalidArgument`], [`VarError::ProducerFailed`],
//! [`VarError::Interrupted`], [`VarError::Spawn`]) are things callers are
//! expected to handle. [`VarError::Internal`] is the catch-all for channel
//! failures that cannot be classified and indicates a bug.

use std::sync::Arc;

use thiserror::Error;

/// The cause a broadcast ring was closed with.
///
/// Shared by every subscriber of the ring, so it is reference counted.
pub type CloseCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from a blocking or non-blocking receive on a broadcast ring.
#[derive(Clone, Debug, Error)]
pub enum ChannelError {
    /// The calling task was interrupted while waiting for a value.
    #[error("receive interrupted")]
    Interrupted,
    /// The ring has been closed permanently.
    #[error("channel closed: {0}")]
    Closed(CloseCause),
}

/// Errors starting a task on a scheduler.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SpawnError {
    /// The operating system refused to create a thread.
    #[error("failed to spawn thread '{name}': {reason}")]
    Thread {
        /// Name the thread would have had.
        name: String,
        /// Description of the OS failure.
        reason: String,
    },
    /// The scheduler no longer accepts work.
    #[error("scheduler '{0}' is shut down")]
    ShutDown(String),
}

/// Failure raised by a producer computation.
///
/// Captured once, stored as the close cause of the variable's ring, and
/// re-surfaced unchanged to every consumer.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProducerError {
    /// The computation reported a failure.
    #[error("producer failed: {reason}")]
    Failed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The computation panicked.
    #[error("producer panicked: {message}")]
    Panicked {
        /// The panic payload, if it was a string.
        message: String,
    },
    /// Reading an upstream variable failed inside the computation.
    #[error("upstream variable failed: {0}")]
    Upstream(Box<VarError>),
}

impl ProducerError {
    /// Shorthand for [`ProducerError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

impl From<VarError> for ProducerError {
    fn from(e: VarError) -> Self {
        Self::Upstream(Box::new(e))
    }
}

/// Errors from constructing or reading a dataflow variable.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VarError {
    /// Malformed construction input.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Which argument was rejected and why.
        reason: String,
    },
    /// The variable's producer failed; the variable is permanently failed.
    #[error(transparent)]
    ProducerFailed(ProducerError),
    /// The calling task was interrupted while blocked in a read.
    #[error("read interrupted")]
    Interrupted,
    /// The producer task could not be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// A channel failure that is not a producer failure.
    #[error("internal invariant violated: {reason}")]
    Internal {
        /// Description of the unexpected failure.
        reason: String,
    },
}

impl VarError {
    /// Translate a ring failure into the variable-level taxonomy.
    ///
    /// A close cause that is a [`ProducerError`] is re-surfaced as-is;
    /// anything else is an internal invariant failure.
    pub fn from_channel(e: ChannelError) -> Self {
        match e {
            ChannelError::Interrupted => Self::Interrupted,
            ChannelError::Closed(cause) => match cause.downcast_ref::<ProducerError>() {
                Some(p) => Self::ProducerFailed(p.clone()),
                None => Self::Internal {
                    reason: cause.to_string(),
                },
            },
        }
    }

    /// The producer failure carried by this error, if any.
    pub fn producer_error(&self) -> Option<&ProducerError> {
        match self {
            Self::ProducerFailed(p) => Some(p),
            _ => None,
        }
    }
}
