//! Independent read cursors over a [`BroadcastRing`].

use std::sync::Arc;

use rivulet_core::ChannelError;
use rivulet_task::current_task;

use crate::ring::BroadcastRing;

/// A reader's private position in a ring.
///
/// The cursor only moves when its owner reads. Values displaced before
/// the owner got to them are skipped silently; values are never observed
/// out of publish order.
pub struct Subscriber<T> {
    ring: Arc<BroadcastRing<T>>,
    /// Monotonic position of the next value this cursor wants.
    next: u64,
}

impl<T: Clone> Subscriber<T> {
    pub(crate) fn new(ring: Arc<BroadcastRing<T>>) -> Self {
        Self { ring, next: 0 }
    }

    /// Block the calling task until a value at or after the cursor is
    /// available, then return the oldest such value still retained.
    ///
    /// Fails with [`ChannelError::Interrupted`] if the calling task is
    /// interrupted while waiting, and with [`ChannelError::Closed`] once
    /// the ring is closed.
    pub fn receive(&mut self) -> Result<T, ChannelError> {
        let task = current_task();
        loop {
            {
                let mut st = self.ring.lock();
                if let Some(cause) = st.closed() {
                    let cause = Arc::clone(cause);
                    st.remove_waiter(task.id());
                    return Err(ChannelError::Closed(cause));
                }
                if let Some(value) = st.read_from(&mut self.next) {
                    st.remove_waiter(task.id());
                    return Ok(value);
                }
                if task.take_interrupt() {
                    st.remove_waiter(task.id());
                    return Err(ChannelError::Interrupted);
                }
                // Registered under the lock, so a publish after this point
                // is guaranteed to unpark us.
                st.add_waiter(&task);
            }
            task.park();
        }
    }

    /// Non-blocking: return the newest value published since the cursor,
    /// jumping the cursor to it, or `None` if there is nothing new.
    pub fn try_receive(&mut self) -> Result<Option<T>, ChannelError> {
        let st = self.ring.lock();
        if let Some(cause) = st.closed() {
            return Err(ChannelError::Closed(Arc::clone(cause)));
        }
        Ok(st.read_newest(&mut self.next))
    }

    /// Non-blocking: return the oldest retained value at or after the
    /// cursor, advancing past it, or `None` if there is nothing new.
    pub fn poll_next(&mut self) -> Result<Option<T>, ChannelError> {
        let st = self.ring.lock();
        if let Some(cause) = st.closed() {
            return Err(ChannelError::Closed(Arc::clone(cause)));
        }
        Ok(st.read_from(&mut self.next))
    }

    /// Number of values published that this cursor has not yet passed,
    /// including ones already displaced.
    pub fn lag(&self) -> u64 {
        self.ring.lock().write_pos().saturating_sub(self.next)
    }

    /// The cursor's monotonic position.
    pub fn position(&self) -> u64 {
        self.next
    }

    /// The ring this cursor reads from.
    pub fn ring(&self) -> &Arc<BroadcastRing<T>> {
        &self.ring
    }
}

impl<T> std::fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}
