//! Per-(variable, task) read state.

use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;
use rivulet_channel::{BroadcastRing, Subscriber};
use rivulet_core::{ChannelError, TaskId};
use rivulet_task::{Task, WeakTask};

/// What travels through a variable's ring. `Empty` stands in for a
/// published `None` so "no value" is an ordinary ring entry.
#[derive(Clone, Debug)]
pub(crate) enum Slot<T> {
    Value(T),
    Empty,
}

impl<T> Slot<T> {
    pub(crate) fn into_option(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Empty => None,
        }
    }
}

impl<T> From<Option<T>> for Slot<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Empty,
        }
    }
}

/// How a reading task relates to the variable. Decided once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReaderKind {
    Unclassified,
    /// A producer task; registered as a dependent.
    DependentProducer,
    Plain,
}

/// One task's cursor, classification, and cached value for one variable.
pub(crate) struct ConsumerContext<T> {
    cursor: Subscriber<Slot<T>>,
    pub(crate) kind: ReaderKind,
    last: Option<Slot<T>>,
}

impl<T: Clone> ConsumerContext<T> {
    fn new(cursor: Subscriber<Slot<T>>) -> Self {
        Self {
            cursor,
            kind: ReaderKind::Unclassified,
            last: None,
        }
    }

    /// Block for the first value; after that, return the newest value
    /// published since the last read, or the cached one if there is none.
    pub(crate) fn current(&mut self) -> Result<Option<T>, ChannelError> {
        let slot = match &self.last {
            None => self.cursor.receive()?,
            Some(cached) => match self.cursor.try_receive()? {
                Some(newer) => newer,
                None => cached.clone(),
            },
        };
        self.last = Some(slot.clone());
        Ok(slot.into_option())
    }

    /// Block for the next value at or after the cursor, ignoring the cache.
    pub(crate) fn next(&mut self) -> Result<Option<T>, ChannelError> {
        let slot = self.cursor.receive()?;
        self.last = Some(slot.clone());
        Ok(slot.into_option())
    }
}

struct ConsumerEntry<T> {
    owner: WeakTask,
    ctx: Arc<Mutex<ConsumerContext<T>>>,
}

/// Explicit table of consumer contexts keyed by reading task.
///
/// Entries of tasks that have exited are pruned whenever a new entry is
/// inserted.
pub(crate) struct ConsumerTable<T> {
    entries: Mutex<IndexMap<TaskId, ConsumerEntry<T>>>,
}

impl<T: Clone> ConsumerTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
        }
    }

    /// The context for `task`, created on first use.
    pub(crate) fn context_for(
        &self,
        task: &Task,
        ring: &Arc<BroadcastRing<Slot<T>>>,
    ) -> Arc<Mutex<ConsumerContext<T>>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(&task.id()) {
            return Arc::clone(&entry.ctx);
        }
        entries.retain(|_, e| !e.owner.is_dead());
        let ctx = Arc::new(Mutex::new(ConsumerContext::new(ring.subscribe())));
        entries.insert(
            task.id(),
            ConsumerEntry {
                owner: task.downgrade(),
                ctx: Arc::clone(&ctx),
            },
        );
        ctx
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
