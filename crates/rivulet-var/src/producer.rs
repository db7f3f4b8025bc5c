//! Background producer tasks.
//!
//! A producer task runs a compute → publish → park loop for exactly one
//! variable:
//!
//! 1. Upgrade the weak handle to the variable; exit if it is gone.
//! 2. Run the computation. Reads it makes on other variables register
//!    this task as their dependent and land in the task's read set.
//! 3. `set()` the result, waking this variable's own dependents.
//! 4. Release the variable and park until some dependency is updated.
//!
//! A failing computation closes the variable's ring with the error, which
//! every consumer then observes. On either exit path the task removes
//! itself from every variable in its read set and wakes their
//! dependents once.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use indexmap::IndexMap;

use rivulet_core::{ProducerError, SpawnError, TaskId, VarId};
use rivulet_task::{current_task, Scheduler, Task, TaskKind, TaskSpawn};

use crate::dependents::Dependency;
use crate::var::VarShared;

/// Why a producer task stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProducerExit {
    /// Every handle to the variable was dropped.
    VarDropped,
    /// The computation failed; the variable is permanently failed.
    Failed(ProducerError),
}

/// State attached to a producer task, recovered by variables that the
/// task reads via [`Task::producer_state`].
pub(crate) struct ProducerState {
    var_id: VarId,
    /// Variables read by the computation. Weak, so a producer never pins
    /// what it reads, including its own variable.
    read_set: Mutex<IndexMap<VarId, Weak<dyn Dependency>>>,
    exit: OnceLock<ProducerExit>,
}

impl ProducerState {
    fn new(var_id: VarId) -> Self {
        Self {
            var_id,
            read_set: Mutex::new(IndexMap::new()),
            exit: OnceLock::new(),
        }
    }

    pub(crate) fn record_read(&self, var: VarId, dep: Weak<dyn Dependency>) {
        self.read_set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(var, dep);
    }

    fn read_set_len(&self) -> usize {
        self.read_set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deregister `task` from everything it read and wake those
    /// variables' remaining dependents once.
    fn teardown(&self, task: TaskId) {
        let deps: Vec<Weak<dyn Dependency>> = self
            .read_set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .map(|(_, dep)| dep)
            .collect();
        for dep in deps.iter().filter_map(Weak::upgrade) {
            dep.remove_dependent(task);
            let woken = dep.wake_dependents();
            tracing::trace!(%task, upstream = %dep.var_id(), woken, "deregistered from upstream");
        }
    }
}

/// Handle for observing a variable's producer task.
///
/// Remains usable after the variable itself has been dropped.
#[derive(Clone)]
pub struct ProducerHandle {
    task: Task,
    state: Arc<ProducerState>,
    exit_rx: Receiver<ProducerExit>,
}

impl ProducerHandle {
    /// The producer's task.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// The ID of the variable this producer serves.
    pub fn var_id(&self) -> VarId {
        self.state.var_id
    }

    /// Number of variables the computation has read so far.
    pub fn read_count(&self) -> usize {
        self.state.read_set_len()
    }

    /// The exit reason, if the task has finished.
    pub fn exit(&self) -> Option<ProducerExit> {
        self.state.exit.get().cloned()
    }

    /// Whether the task has finished.
    pub fn is_terminated(&self) -> bool {
        self.state.exit.get().is_some()
    }

    /// Wait up to `timeout` for the task to finish.
    pub fn wait_exit(&self, timeout: Duration) -> Option<ProducerExit> {
        if let Some(exit) = self.exit() {
            return Some(exit);
        }
        match self.exit_rx.recv_timeout(timeout) {
            Ok(exit) => Some(exit),
            // Another handle consumed the message; the state has it.
            Err(RecvTimeoutError::Disconnected) => self.exit(),
            Err(RecvTimeoutError::Timeout) => None,
        }
    }
}

impl std::fmt::Debug for ProducerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerHandle")
            .field("task", &self.task.id())
            .field("var", &self.state.var_id)
            .field("exit", &self.exit())
            .finish()
    }
}

/// Start the producer task for `shared` on `scheduler`.
pub(crate) fn spawn<T>(
    shared: &Arc<VarShared<T>>,
    scheduler: &dyn Scheduler,
) -> Result<ProducerHandle, SpawnError>
where
    T: Clone + Send + Sync + 'static,
{
    let state = Arc::new(ProducerState::new(shared.id()));
    let (exit_tx, exit_rx) = crossbeam_channel::bounded(1);
    let var = Arc::downgrade(shared);
    let loop_state = Arc::clone(&state);
    let name = shared
        .name()
        .map_or_else(|| shared.id().to_string(), str::to_string);
    let kind = TaskKind::Producer(Arc::clone(&state) as Arc<dyn Any + Send + Sync>);

    let task = scheduler.spawn(TaskSpawn::new(kind, Some(name), move || {
        run(var, loop_state, exit_tx)
    }))?;
    tracing::debug!(var = %shared.id(), task = %task.id(), "producer spawned");

    Ok(ProducerHandle {
        task,
        state,
        exit_rx,
    })
}

fn run<T>(var: Weak<VarShared<T>>, state: Arc<ProducerState>, exit_tx: Sender<ProducerExit>)
where
    T: Clone + Send + Sync + 'static,
{
    let task = current_task();
    let exit = loop {
        let Some(shared) = var.upgrade() else {
            break ProducerExit::VarDropped;
        };
        match shared.compute() {
            Ok(value) => shared.set(value),
            Err(e) => {
                tracing::warn!(var = %shared.id(), error = %e, "producer computation failed");
                shared.fail(e.clone());
                break ProducerExit::Failed(e);
            }
        }
        // Parking with `shared` alive would pin the variable.
        drop(shared);
        task.park();
        tracing::trace!(var = %state.var_id, task = %task.id(), "producer woken");
    };

    state.teardown(task.id());
    tracing::debug!(var = %state.var_id, task = %task.id(), ?exit, "producer exited");
    let _ = state.exit.set(exit.clone());
    let _ = exit_tx.send(exit);
}

/// Run `f`, converting a panic into [`ProducerError::Panicked`].
pub(crate) fn catch_producer_panic<R>(
    f: impl FnOnce() -> Result<R, ProducerError>,
) -> Result<R, ProducerError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(ProducerError::Panicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_becomes_producer_error() {
        let r: Result<u32, _> = catch_producer_panic(|| panic!("kaboom"));
        assert_eq!(
            r,
            Err(ProducerError::Panicked {
                message: "kaboom".into()
            })
        );
    }

    #[test]
    fn formatted_panic_message_is_kept() {
        let n = 3;
        let r: Result<u32, _> = catch_producer_panic(|| panic!("bad value {n}"));
        assert_eq!(
            r,
            Err(ProducerError::Panicked {
                message: "bad value 3".into()
            })
        );
    }

    #[test]
    fn ok_and_err_pass_through() {
        assert_eq!(catch_producer_panic(|| Ok::<_, ProducerError>(5)), Ok(5));
        assert_eq!(
            catch_producer_panic(|| Err::<u8, _>(ProducerError::failed("x"))),
            Err(ProducerError::failed("x"))
        );
    }

    #[test]
    fn teardown_on_empty_read_set_is_noop() {
        let state = ProducerState::new(VarId::next());
        state.teardown(TaskId::next());
        assert_eq!(state.read_set_len(), 0);
    }
}
