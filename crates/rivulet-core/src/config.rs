//! Variable and scheduler configuration.
//!
//! Both structs are plain data with a `Default` and a `validate()` that
//! checks structural invariants before anything is allocated or spawned.

use crate::error::VarError;

/// Largest accepted history depth.
///
/// The ring pre-allocates `history + 1` slots, so this bounds the up-front
/// allocation of a single variable.
pub const MAX_HISTORY: usize = 1 << 20;

// ── VarConfig ─────────────────────────────────────────────────────

/// Construction parameters for a dataflow variable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VarConfig {
    /// Number of past values retained beyond the latest. Ring capacity is
    /// `history + 1`. Default: 0.
    pub history: usize,
    /// Optional diagnostic name, used in logs and producer thread names.
    pub name: Option<String>,
}

impl VarConfig {
    /// Config with the given history depth and no name.
    pub fn with_history(history: usize) -> Self {
        Self {
            history,
            name: None,
        }
    }

    /// Ring capacity implied by this config.
    pub fn capacity(&self) -> usize {
        self.history + 1
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), VarError> {
        if self.history > MAX_HISTORY {
            return Err(VarError::InvalidArgument {
                reason: format!(
                    "history must be <= {MAX_HISTORY}, but is {}",
                    self.history
                ),
            });
        }
        if let Some(name) = &self.name {
            if name.is_empty() {
                return Err(VarError::InvalidArgument {
                    reason: "name must not be empty".into(),
                });
            }
        }
        Ok(())
    }
}

// ── SchedulerConfig ───────────────────────────────────────────────

/// Configuration for the thread-per-task scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Prefix for spawned thread names. Default: `"rivulet"`.
    pub thread_name_prefix: String,
    /// Stack size for spawned threads. `None` = platform default.
    pub stack_size: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "rivulet".into(),
            stack_size: None,
        }
    }
}

impl SchedulerConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), VarError> {
        if self.thread_name_prefix.is_empty() {
            return Err(VarError::InvalidArgument {
                reason: "thread_name_prefix must not be empty".into(),
            });
        }
        if self.stack_size == Some(0) {
            return Err(VarError::InvalidArgument {
                reason: "stack_size must be non-zero".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_var_config_is_valid() {
        let cfg = VarConfig::default();
        assert_eq!(cfg.history, 0);
        assert_eq!(cfg.capacity(), 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn oversized_history_rejected() {
        let cfg = VarConfig::with_history(MAX_HISTORY + 1);
        assert!(matches!(
            cfg.validate(),
            Err(VarError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn empty_name_rejected() {
        let cfg = VarConfig {
            history: 1,
            name: Some(String::new()),
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn scheduler_config_validation() {
        assert!(SchedulerConfig::default().validate().is_ok());
        let empty = SchedulerConfig {
            thread_name_prefix: String::new(),
            stack_size: None,
        };
        assert!(empty.validate().is_err());
        let zero_stack = SchedulerConfig {
            stack_size: Some(0),
            ..SchedulerConfig::default()
        };
        assert!(zero_stack.validate().is_err());
    }

    proptest! {
        #[test]
        fn capacity_is_history_plus_one(history in 0usize..=MAX_HISTORY) {
            let cfg = VarConfig::with_history(history);
            prop_assert!(cfg.validate().is_ok());
            prop_assert_eq!(cfg.capacity(), history + 1);
        }
    }
}
