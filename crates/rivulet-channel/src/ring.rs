//! Fixed-capacity broadcast ring with displacement overflow.
//!
//! [`BroadcastRing`] stores tagged slots behind a single mutex. The lock is
//! held only to copy a value in or out and to update the waiter list; no
//! thread ever parks while holding it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use smallvec::SmallVec;

use rivulet_core::{CloseCause, TaskId};
use rivulet_task::Task;

use crate::subscriber::Subscriber;

/// A tagged slot: the `u64` is the monotonic write position at which the
/// value was stored, so a reader can tell a live slot from an overwritten
/// one.
type Slot<T> = Option<(u64, T)>;

/// Outcome of [`BroadcastRing::publish`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Publish {
    /// Stored in a free slot.
    Stored,
    /// Stored by overwriting the oldest retained value.
    Displaced,
    /// The ring is closed; the value was discarded.
    Closed,
}

pub(crate) struct RingState<T> {
    slots: Vec<Slot<T>>,
    /// Monotonic position of the next write. Never wraps.
    write_pos: u64,
    closed: Option<CloseCause>,
    /// Tasks parked in `Subscriber::receive`, woken by the next publish.
    waiters: IndexMap<TaskId, Task>,
}

impl<T: Clone> RingState<T> {
    pub(crate) fn closed(&self) -> Option<&CloseCause> {
        self.closed.as_ref()
    }

    pub(crate) fn write_pos(&self) -> u64 {
        self.write_pos
    }

    /// Oldest position still held by the ring.
    fn oldest_pos(&self) -> u64 {
        self.write_pos.saturating_sub(self.slots.len() as u64)
    }

    /// Read the oldest retained value at or after `*next` and advance past
    /// it. `None` if nothing at or after `*next` has been written.
    pub(crate) fn read_from(&self, next: &mut u64) -> Option<T> {
        if *next >= self.write_pos {
            return None;
        }
        let pos = (*next).max(self.oldest_pos());
        let value = self.value_at(pos)?;
        *next = pos + 1;
        Some(value)
    }

    /// Read the newest value if it is at or after `*next`, advancing the
    /// cursor to the write position.
    pub(crate) fn read_newest(&self, next: &mut u64) -> Option<T> {
        if *next >= self.write_pos {
            return None;
        }
        let value = self.value_at(self.write_pos - 1)?;
        *next = self.write_pos;
        Some(value)
    }

    fn value_at(&self, pos: u64) -> Option<T> {
        let idx = (pos % self.slots.len() as u64) as usize;
        match &self.slots[idx] {
            Some((tag, value)) if *tag == pos => Some(value.clone()),
            _ => None,
        }
    }

    pub(crate) fn add_waiter(&mut self, task: &Task) {
        self.waiters.insert(task.id(), task.clone());
    }

    pub(crate) fn remove_waiter(&mut self, id: TaskId) {
        self.waiters.swap_remove(&id);
    }

    fn take_waiters(&mut self) -> SmallVec<[Task; 4]> {
        self.waiters.drain(..).map(|(_, task)| task).collect()
    }
}

/// A fixed-capacity, multi-reader broadcast ring.
///
/// Any thread may publish; publishing never blocks beyond the short
/// internal lock. Readers subscribe to obtain an independent cursor.
pub struct BroadcastRing<T> {
    state: Mutex<RingState<T>>,
    capacity: usize,
    published: AtomicU64,
    displaced: AtomicU64,
}

// Compile-time assertion: BroadcastRing<u64> must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<BroadcastRing<u64>>();
};

impl<T: Clone> BroadcastRing<T> {
    /// Create a new ring with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`. Callers validate capacity up front
    /// (see [`VarConfig::validate`](rivulet_core::VarConfig::validate)).
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "BroadcastRing capacity must be >= 1");
        let slots = (0..capacity).map(|_| None).collect();
        Self {
            state: Mutex::new(RingState {
                slots,
                write_pos: 0,
                closed: None,
                waiters: IndexMap::new(),
            }),
            capacity,
            published: AtomicU64::new(0),
            displaced: AtomicU64::new(0),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RingState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a new cursor positioned at the oldest retained value.
    pub fn subscribe(self: &Arc<Self>) -> Subscriber<T> {
        Subscriber::new(Arc::clone(self))
    }

    /// Publish a value, overwriting the oldest slot if the ring is full,
    /// and wake every parked reader.
    pub fn publish(&self, value: T) -> Publish {
        let (outcome, waiters) = {
            let mut st = self.lock();
            if st.closed.is_some() {
                return Publish::Closed;
            }
            let pos = st.write_pos;
            let idx = (pos % self.capacity as u64) as usize;
            let evicted = st.slots[idx].replace((pos, value)).is_some();
            st.write_pos = pos + 1;
            self.published.fetch_add(1, Ordering::Relaxed);
            if evicted {
                self.displaced.fetch_add(1, Ordering::Relaxed);
            }
            let outcome = if evicted {
                Publish::Displaced
            } else {
                Publish::Stored
            };
            (outcome, st.take_waiters())
        };
        for task in &waiters {
            task.unpark();
        }
        outcome
    }

    /// Close the ring permanently. Every blocked and future receive fails
    /// with `cause`. Returns `false` if the ring was already closed, in
    /// which case the first cause is kept.
    pub fn close(&self, cause: CloseCause) -> bool {
        let waiters = {
            let mut st = self.lock();
            if st.closed.is_some() {
                return false;
            }
            st.closed = Some(cause);
            st.take_waiters()
        };
        for task in &waiters {
            task.unpark();
        }
        true
    }

    /// Whether the ring has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed.is_some()
    }

    /// The cause the ring was closed with, if any.
    pub fn close_cause(&self) -> Option<CloseCause> {
        self.lock().closed.clone()
    }

    /// Number of values currently retained (up to `capacity`).
    pub fn len(&self) -> usize {
        let pos = self.lock().write_pos;
        pos.min(self.capacity as u64) as usize
    }

    /// Whether nothing has been published yet.
    pub fn is_empty(&self) -> bool {
        self.lock().write_pos == 0
    }

    /// The ring capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The monotonic write position (total values stored).
    pub fn write_pos(&self) -> u64 {
        self.lock().write_pos
    }

    /// The newest value, without touching any cursor.
    pub fn latest(&self) -> Option<T> {
        let st = self.lock();
        let pos = st.write_pos.checked_sub(1)?;
        st.value_at(pos)
    }

    /// Total successful publishes.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Total publishes that evicted an older value.
    pub fn displaced_count(&self) -> u64 {
        self.displaced.load(Ordering::Relaxed)
    }

    /// Number of readers currently parked on this ring.
    pub fn waiter_count(&self) -> usize {
        self.lock().waiters.len()
    }
}

impl<T> std::fmt::Debug for BroadcastRing<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastRing")
            .field("capacity", &self.capacity)
            .field("published", &self.published.load(Ordering::Relaxed))
            .field("displaced", &self.displaced.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
