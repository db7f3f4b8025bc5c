//! Dependent producer bookkeeping.

use std::sync::{Mutex, PoisonError};

use indexmap::IndexMap;
use smallvec::SmallVec;

use rivulet_core::{TaskId, VarId};
use rivulet_task::{Task, WeakTask};

/// A variable as seen from a producer's read set, independent of its
/// value type.
pub(crate) trait Dependency: Send + Sync {
    fn var_id(&self) -> VarId;

    /// Forget `task` as a dependent.
    fn remove_dependent(&self, task: TaskId);

    /// Wake every registered dependent. Returns how many were woken.
    fn wake_dependents(&self) -> usize;
}

/// The set of producer tasks that read a variable.
///
/// Holds weak handles only. Waking is idempotent and may race freely with
/// registration and removal: a task registered concurrently with a wake
/// may or may not receive that wake, and is guaranteed the next one.
pub(crate) struct Dependents {
    tasks: Mutex<IndexMap<TaskId, WeakTask>>,
}

impl Dependents {
    pub(crate) fn new() -> Self {
        Self {
            tasks: Mutex::new(IndexMap::new()),
        }
    }

    pub(crate) fn insert(&self, task: &Task) {
        self.lock().insert(task.id(), task.downgrade());
    }

    pub(crate) fn remove(&self, id: TaskId) {
        self.lock().swap_remove(&id);
    }

    /// Unpark every live dependent. Entries whose task no longer exists
    /// are dropped.
    pub(crate) fn wake_all(&self) -> usize {
        let targets: SmallVec<[Task; 4]> = {
            let mut tasks = self.lock();
            tasks.retain(|_, t| t.upgrade().is_some());
            tasks.values().filter_map(WeakTask::upgrade).collect()
        };
        for task in &targets {
            task.unpark();
        }
        targets.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: TaskId) -> bool {
        self.lock().contains_key(&id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<TaskId, WeakTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
