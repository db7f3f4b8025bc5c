//! Schedulers: where producer tasks run.
//!
//! A [`Scheduler`] accepts a [`TaskSpawn`] and arranges for
//! [`TaskSpawn::run`] to be called on some thread. The body of a producer
//! task parks between computations, so a scheduler must give each task a
//! thread of its own; [`ThreadScheduler`] does exactly that.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::thread;

use rivulet_core::{SchedulerConfig, SpawnError, VarError};

use crate::task::{bind, Task, TaskKind};

/// A task paired with the body it will run.
pub struct TaskSpawn {
    task: Task,
    body: Box<dyn FnOnce() + Send + 'static>,
}

impl TaskSpawn {
    /// Create a new task of the given kind around `body`.
    pub fn new(
        kind: TaskKind,
        name: Option<String>,
        body: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            task: Task::new(kind, name),
            body: Box::new(body),
        }
    }

    /// The task that will run the body.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Run the body on the calling thread with the task bound as current.
    ///
    /// The task is marked terminated when the body returns or unwinds.
    pub fn run(self) {
        let _guard = bind(self.task);
        (self.body)();
    }
}

impl fmt::Debug for TaskSpawn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpawn")
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

/// Something that can start tasks.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Start `spawn` running. Returns the task handle on success.
    fn spawn(&self, spawn: TaskSpawn) -> Result<Task, SpawnError>;
}

/// Runs every task on a dedicated, named OS thread.
#[derive(Debug, Default)]
pub struct ThreadScheduler {
    config: SchedulerConfig,
}

impl ThreadScheduler {
    /// Create a scheduler after validating `config`.
    pub fn new(config: SchedulerConfig) -> Result<Self, VarError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The scheduler's configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

impl Scheduler for ThreadScheduler {
    fn spawn(&self, spawn: TaskSpawn) -> Result<Task, SpawnError> {
        let task = spawn.task().clone();
        let name = match task.name() {
            Some(n) => format!("{}-{n}", self.config.thread_name_prefix),
            None => format!("{}-{}", self.config.thread_name_prefix, task.id()),
        };
        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }
        builder
            .spawn(move || spawn.run())
            .map_err(|e| SpawnError::Thread {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!(task = %task.id(), thread = %name, "spawned task thread");
        Ok(task)
    }
}

/// The process-wide default scheduler, created on first use.
pub fn default_scheduler() -> Arc<dyn Scheduler> {
    static DEFAULT: OnceLock<Arc<dyn Scheduler>> = OnceLock::new();
    Arc::clone(DEFAULT.get_or_init(|| Arc::new(ThreadScheduler::default())))
}
