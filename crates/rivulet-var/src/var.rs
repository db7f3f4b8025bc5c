//! User-facing [`Var`] API and its shared state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use rivulet_channel::{BroadcastRing, Publish};
use rivulet_core::{ProducerError, TaskId, VarConfig, VarError, VarId, VarMetrics};
use rivulet_task::{current_task, default_scheduler, Scheduler, Task};

use crate::consumer::{ConsumerContext, ConsumerTable, ReaderKind, Slot};
use crate::dependents::{Dependency, Dependents};
use crate::producer::{self, catch_producer_panic, ProducerHandle, ProducerState};

type ProducerFn<T> = Box<dyn FnMut() -> Result<Option<T>, ProducerError> + Send + 'static>;

// ── VarShared ────────────────────────────────────────────────────

/// State shared by every handle to one variable. The producer task holds
/// only a `Weak` to this.
pub(crate) struct VarShared<T> {
    id: VarId,
    config: VarConfig,
    ring: Arc<BroadcastRing<Slot<T>>>,
    /// Only the producer task ever locks this.
    producer_fn: Option<Mutex<ProducerFn<T>>>,
    producer: OnceLock<ProducerHandle>,
    dependents: Dependents,
    consumers: ConsumerTable<T>,
    dependent_wakes: AtomicU64,
    recomputations: AtomicU64,
}

impl<T> VarShared<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn id(&self) -> VarId {
        self.id
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }

    /// Publish `value` and wake every registered dependent.
    pub(crate) fn set(&self, value: Option<T>) {
        if self.ring.publish(Slot::from(value)) == Publish::Closed {
            tracing::trace!(var = %self.id, "set on failed variable discarded");
        }
        let woken = self.wake_dependents();
        tracing::trace!(var = %self.id, woken, "published");
    }

    /// Run the producer computation once.
    pub(crate) fn compute(&self) -> Result<Option<T>, ProducerError> {
        let Some(f) = &self.producer_fn else {
            return Err(ProducerError::failed("variable has no producer"));
        };
        let mut f = f.lock().unwrap_or_else(PoisonError::into_inner);
        let result = catch_producer_panic(|| (&mut **f)());
        self.recomputations.fetch_add(1, Ordering::Relaxed);
        result
    }

    /// Permanently fail the variable with `error`.
    pub(crate) fn fail(&self, error: ProducerError) {
        self.ring.close(Arc::new(error));
    }
}

impl<T> Dependency for VarShared<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn var_id(&self) -> VarId {
        self.id
    }

    fn remove_dependent(&self, task: TaskId) {
        self.dependents.remove(task);
    }

    fn wake_dependents(&self) -> usize {
        let woken = self.dependents.wake_all();
        self.dependent_wakes
            .fetch_add(woken as u64, Ordering::Relaxed);
        woken
    }
}

impl<T> Drop for VarShared<T> {
    fn drop(&mut self) {
        // Let the producer observe the dead weak handle now rather than
        // on the next upstream update.
        if let Some(handle) = self.producer.get() {
            handle.task().unpark();
        }
    }
}

// ── Var ──────────────────────────────────────────────────────────

/// A dataflow variable.
///
/// Cloning a `Var` yields another handle to the same variable. The
/// variable, and its producer task if it has one, live until the last
/// handle is dropped.
///
/// Each task that reads a variable gets its own cursor into the
/// variable's history, so readers never interfere with each other:
///
/// ```
/// # use rivulet_var::Var;
/// # fn main() -> Result<(), rivulet_core::VarError> {
/// let v: Var<i32> = Var::with_history(2)?;
/// v.set(1);
/// v.set(2);
/// assert_eq!(v.get()?, Some(1)); // oldest retained, first read
/// assert_eq!(v.get()?, Some(2)); // newest since last read
/// assert_eq!(v.get()?, Some(2)); // cached, never blocks
/// # Ok(())
/// # }
/// ```
pub struct Var<T> {
    shared: Arc<VarShared<T>>,
}

impl<T> Clone for Var<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Var<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A variable with no history and no producer.
    pub fn new() -> Self {
        Self::from_parts(VarConfig::default(), None)
    }

    /// A variable retaining `history` values beyond the latest, with no
    /// producer.
    pub fn with_history(history: usize) -> Result<Self, VarError> {
        Self::builder().history(history).build()
    }

    /// A variable with no history whose value is computed by `producer`
    /// on the default scheduler.
    pub fn producing<F, V>(producer: F) -> Result<Self, VarError>
    where
        F: FnMut() -> Result<V, ProducerError> + Send + 'static,
        V: Into<Option<T>> + 'static,
    {
        Self::builder().producer(producer).build()
    }

    /// Start building a variable.
    pub fn builder() -> VarBuilder<T> {
        VarBuilder::new()
    }

    fn from_parts(config: VarConfig, producer_fn: Option<ProducerFn<T>>) -> Self {
        let ring = Arc::new(BroadcastRing::new(config.capacity()));
        Self {
            shared: Arc::new(VarShared {
                id: VarId::next(),
                config,
                ring,
                producer_fn: producer_fn.map(Mutex::new),
                producer: OnceLock::new(),
                dependents: Dependents::new(),
                consumers: ConsumerTable::new(),
                dependent_wakes: AtomicU64::new(0),
                recomputations: AtomicU64::new(0),
            }),
        }
    }

    /// Publish a new value (`None` is a legitimate value) and wake every
    /// producer task that depends on this variable.
    ///
    /// Never blocks. Setting a failed variable has no effect.
    pub fn set(&self, value: impl Into<Option<T>>) {
        self.shared.set(value.into());
    }

    /// The calling task's current view of the value.
    ///
    /// The first call from a task blocks until a value is available and
    /// returns the oldest value still retained. Later calls never block:
    /// they return the newest value published since the previous read,
    /// or the previously returned value if nothing new arrived.
    ///
    /// When called from a producer task, registers that task as a
    /// dependent so it re-runs on every update of this variable.
    pub fn get(&self) -> Result<Option<T>, VarError> {
        self.read(ConsumerContext::current)
    }

    /// Block until the next value at or after the calling task's cursor
    /// is available, ignoring any cached value.
    pub fn get_next(&self) -> Result<Option<T>, VarError> {
        self.read(ConsumerContext::next)
    }

    fn read(
        &self,
        op: impl FnOnce(&mut ConsumerContext<T>) -> Result<Option<T>, rivulet_core::ChannelError>,
    ) -> Result<Option<T>, VarError> {
        let task = current_task();
        let ctx = self.shared.consumers.context_for(&task, &self.shared.ring);
        let mut ctx = ctx.lock().unwrap_or_else(PoisonError::into_inner);
        if ctx.kind == ReaderKind::Unclassified {
            ctx.kind = self.classify(&task);
        }
        op(&mut *ctx).map_err(VarError::from_channel)
    }

    fn classify(&self, task: &Task) -> ReaderKind {
        match task.producer_state::<ProducerState>() {
            Some(state) => {
                self.shared.dependents.insert(task);
                let dep: Weak<VarShared<T>> = Arc::downgrade(&self.shared);
                state.record_read(self.shared.id, dep);
                tracing::trace!(var = %self.shared.id, task = %task.id(), "registered dependent");
                ReaderKind::DependentProducer
            }
            None => ReaderKind::Plain,
        }
    }

    /// This variable's unique ID.
    pub fn id(&self) -> VarId {
        self.shared.id
    }

    /// Diagnostic name, if one was configured.
    pub fn name(&self) -> Option<&str> {
        self.shared.name()
    }

    /// Values retained beyond the latest.
    pub fn history(&self) -> usize {
        self.shared.config.history
    }

    /// Handle to the producer task, if this variable has one.
    pub fn producer(&self) -> Option<ProducerHandle> {
        self.shared.producer.get().cloned()
    }

    /// The producer failure this variable was closed with, if any.
    pub fn failure(&self) -> Option<ProducerError> {
        self.shared
            .ring
            .close_cause()
            .and_then(|c| c.downcast_ref::<ProducerError>().cloned())
    }

    /// Number of producer tasks currently registered as dependents.
    pub fn dependent_count(&self) -> usize {
        self.shared.dependents.len()
    }

    /// Point-in-time counters.
    pub fn metrics(&self) -> VarMetrics {
        VarMetrics {
            published: self.shared.ring.published_count(),
            displaced: self.shared.ring.displaced_count(),
            dependent_wakes: self.shared.dependent_wakes.load(Ordering::Relaxed),
            recomputations: self.shared.recomputations.load(Ordering::Relaxed),
            dependents: self.shared.dependents.len(),
            consumers: self.shared.consumers.len(),
        }
    }
}

impl<T> Default for Var<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Var<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("id", &self.shared.id)
            .field("name", &self.shared.config.name)
            .field("history", &self.shared.config.history)
            .field("has_producer", &self.shared.producer_fn.is_some())
            .finish_non_exhaustive()
    }
}

// ── VarBuilder ───────────────────────────────────────────────────

/// Builder for [`Var`].
pub struct VarBuilder<T> {
    config: VarConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
    producer: Option<ProducerFn<T>>,
}

impl<T> VarBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new() -> Self {
        Self {
            config: VarConfig::default(),
            scheduler: None,
            producer: None,
        }
    }

    /// Replace the whole config.
    pub fn config(mut self, config: VarConfig) -> Self {
        self.config = config;
        self
    }

    /// Values retained beyond the latest. Default: 0.
    pub fn history(mut self, history: usize) -> Self {
        self.config.history = history;
        self
    }

    /// Diagnostic name, also used for the producer thread.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Scheduler for the producer task. Default: the process-wide
    /// [`default_scheduler`].
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// The computation whose results feed the variable. Returning
    /// `Ok(None)` publishes "no value"; returning `Err` permanently fails
    /// the variable.
    pub fn producer<F, V>(mut self, mut producer: F) -> Self
    where
        F: FnMut() -> Result<V, ProducerError> + Send + 'static,
        V: Into<Option<T>> + 'static,
    {
        self.producer = Some(Box::new(move || producer().map(Into::<Option<T>>::into)));
        self
    }

    /// Validate the config, create the variable, and start its producer
    /// task if one was given.
    pub fn build(self) -> Result<Var<T>, VarError> {
        self.config.validate()?;
        let has_producer = self.producer.is_some();
        let var = Var::from_parts(self.config, self.producer);
        if has_producer {
            let scheduler = self.scheduler.unwrap_or_else(default_scheduler);
            let handle = producer::spawn(&var.shared, scheduler.as_ref())?;
            let _ = var.shared.producer.set(handle);
        }
        Ok(var)
    }
}

impl<T> fmt::Debug for VarBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VarBuilder")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .field("has_producer", &self.producer.is_some())
            .finish()
    }
}
