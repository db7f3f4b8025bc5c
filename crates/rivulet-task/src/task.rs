//! Task handles and the per-thread current-task binding.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use rivulet_core::TaskId;

use crate::parker::Parker;

/// What kind of task this is.
///
/// Producer tasks carry an opaque state object installed by whoever spawned
/// them; readers use [`Task::producer_state`] to recover it.
#[derive(Clone)]
pub enum TaskKind {
    /// A thread that only reads and writes variables.
    Plain,
    /// A background producer task with its attached state.
    Producer(Arc<dyn Any + Send + Sync>),
}

impl fmt::Debug for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("Plain"),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

struct TaskInner {
    id: TaskId,
    name: Option<String>,
    kind: TaskKind,
    parker: Parker,
    interrupted: AtomicBool,
    terminated: AtomicBool,
}

/// A cloneable handle to a task.
///
/// Handles compare equal when they refer to the same task.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

// Compile-time assertion: Task must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Task>();
};

impl Task {
    /// Create a new, unbound task handle.
    ///
    /// The task has no thread until it is run through a
    /// [`TaskSpawn`](crate::TaskSpawn) or bound as the current task.
    pub fn new(kind: TaskKind, name: Option<String>) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: TaskId::next(),
                name,
                kind,
                parker: Parker::new(),
                interrupted: AtomicBool::new(false),
                terminated: AtomicBool::new(false),
            }),
        }
    }

    /// This task's unique ID.
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Diagnostic name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// The task's kind.
    pub fn kind(&self) -> &TaskKind {
        &self.inner.kind
    }

    /// Whether this is a producer task.
    pub fn is_producer(&self) -> bool {
        matches!(self.inner.kind, TaskKind::Producer(_))
    }

    /// Recover the producer state of type `S`, if this is a producer task
    /// whose state has that type.
    pub fn producer_state<S: Any + Send + Sync>(&self) -> Option<Arc<S>> {
        match &self.inner.kind {
            TaskKind::Producer(state) => Arc::clone(state).downcast::<S>().ok(),
            TaskKind::Plain => None,
        }
    }

    /// Suspend the calling thread until this task is unparked.
    ///
    /// Must only be called from the thread running this task.
    pub fn park(&self) {
        self.inner.parker.park();
    }

    /// Like [`park`](Task::park) but gives up after `timeout`.
    /// Returns `true` if woken.
    pub fn park_timeout(&self, timeout: Duration) -> bool {
        self.inner.parker.park_timeout(timeout)
    }

    /// Wake this task. Safe to call from any thread, any number of times.
    pub fn unpark(&self) {
        self.inner.parker.unpark();
    }

    /// Request interruption of a blocking read and wake the task.
    ///
    /// The flag is consumed by the next interruptible wait.
    pub fn interrupt(&self) {
        self.inner.interrupted.store(true, Ordering::Release);
        self.unpark();
    }

    /// Clear and return the interruption flag.
    pub fn take_interrupt(&self) -> bool {
        self.inner.interrupted.swap(false, Ordering::AcqRel)
    }

    /// Whether an interruption is pending.
    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::Acquire)
    }

    /// Whether the task's thread has finished.
    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::Acquire)
    }

    pub(crate) fn mark_terminated(&self) {
        self.inner.terminated.store(true, Ordering::Release);
    }

    /// A non-owning handle to this task.
    pub fn downgrade(&self) -> WeakTask {
        WeakTask {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Task {}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// A non-owning task handle. Holding one does not keep the task alive.
#[derive(Clone, Debug)]
pub struct WeakTask {
    id: TaskId,
    inner: Weak<TaskInner>,
}

impl WeakTask {
    /// The ID of the task this handle refers to, even if it is gone.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Recover a strong handle if the task still exists.
    pub fn upgrade(&self) -> Option<Task> {
        self.inner.upgrade().map(|inner| Task { inner })
    }

    /// Whether the task is gone or has finished running.
    pub fn is_dead(&self) -> bool {
        self.upgrade().is_none_or(|t| t.is_terminated())
    }

    /// Unpark the task if it still exists. Returns `true` if it did.
    pub fn unpark(&self) -> bool {
        match self.upgrade() {
            Some(task) => {
                task.unpark();
                true
            }
            None => false,
        }
    }
}

// ── current task ──────────────────────────────────────────────────

/// Per-thread binding. Marks the bound task terminated when the thread
/// exits.
struct CurrentSlot(RefCell<Option<Task>>);

impl Drop for CurrentSlot {
    fn drop(&mut self) {
        if let Some(task) = self.0.get_mut().take() {
            task.mark_terminated();
        }
    }
}

thread_local! {
    static CURRENT: CurrentSlot = const { CurrentSlot(RefCell::new(None)) };
}

/// The task running on the calling thread.
///
/// Threads not started by a scheduler are given a plain task identity on
/// first call, stable for the rest of the thread's life.
pub fn current_task() -> Task {
    CURRENT
        .try_with(|slot| {
            slot.0
                .borrow_mut()
                .get_or_insert_with(|| Task::new(TaskKind::Plain, None))
                .clone()
        })
        // Thread-local already torn down (called from another TLS destructor).
        .unwrap_or_else(|_| Task::new(TaskKind::Plain, None))
}

/// Restores the previous binding and marks the task terminated on drop.
pub(crate) struct BindGuard {
    task: Task,
    previous: Option<Task>,
}

/// Bind `task` as the calling thread's current task for the guard's
/// lifetime.
pub(crate) fn bind(task: Task) -> BindGuard {
    let previous = CURRENT
        .try_with(|slot| slot.0.borrow_mut().replace(task.clone()))
        .ok()
        .flatten();
    BindGuard { task, previous }
}

impl Drop for BindGuard {
    fn drop(&mut self) {
        self.task.mark_terminated();
        let previous = self.previous.take();
        let _ = CURRENT.try_with(|slot| *slot.0.borrow_mut() = previous);
    }
}
