use std::{fmt, time::Duration};

use crossbeam_queue::ArrayQueue;
use tokio::time::Instant;

/// A resource sitting in the idle store together with the time it was
/// returned.
pub(crate) struct IdleEntry<T> {
    pub(crate) obj: T,
    pub(crate) returned_at: Instant,
}

impl<T> IdleEntry<T> {
    pub(crate) fn new(obj: T) -> Self {
        Self {
            obj,
            returned_at: Instant::now(),
        }
    }

    pub(crate) fn is_stale(&self, idle_timeout: Option<Duration>) -> bool {
        match idle_timeout {
            Some(timeout) => self.returned_at.elapsed() > timeout,
            None => false,
        }
    }
}

impl<T> fmt::Debug for IdleEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleEntry")
            .field("returned_at", &self.returned_at)
            .finish()
    }
}

/// Bounded FIFO of idle resources.
///
/// Pushing and popping never block. A capacity of zero is allowed and
/// rejects every push.
pub(crate) struct IdleStore<T> {
    queue: Option<ArrayQueue<IdleEntry<T>>>,
}

impl<T> IdleStore<T> {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            queue: if cap == 0 {
                None
            } else {
                Some(ArrayQueue::new(cap))
            },
        }
    }

    pub(crate) fn push(&self, entry: IdleEntry<T>) -> Result<(), IdleEntry<T>> {
        match &self.queue {
            Some(queue) => queue.push(entry),
            None => Err(entry),
        }
    }

    pub(crate) fn pop(&self) -> Option<IdleEntry<T>> {
        self.queue.as_ref().and_then(ArrayQueue::pop)
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.as_ref().map_or(0, ArrayQueue::len)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.queue.as_ref().map_or(0, ArrayQueue::capacity)
    }
}

impl<T> fmt::Debug for IdleStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleStore")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
