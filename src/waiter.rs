use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tokio::sync::oneshot;

use crate::{idle::IdleEntry, pool::PoolInner, Manager};

/// Value delivered to a parked caller.
pub(crate) enum Handoff<T> {
    /// A resource was returned or created on the caller's behalf.
    Ready(IdleEntry<T>),

    /// The background opener failed to create a resource.
    Failed,

    /// The pool has been closed.
    Closed,
}

impl<T> fmt::Debug for Handoff<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(entry) => f.debug_tuple("Ready").field(entry).finish(),
            Self::Failed => f.write_str("Failed"),
            Self::Closed => f.write_str("Closed"),
        }
    }
}

pub(crate) type WaitSlot<T> = oneshot::Sender<Handoff<T>>;

pub(crate) fn wait_slot<T>() -> (WaitSlot<T>, oneshot::Receiver<Handoff<T>>) {
    oneshot::channel()
}

/// Receiving half of a wait request.
///
/// If this future is dropped before it completes, the slot is closed and a
/// resource that was already handed over is routed back into the pool so
/// it is neither lost nor counted twice.
pub(crate) struct Waiter<M: Manager> {
    rx: oneshot::Receiver<Handoff<M::Type>>,
    pool: Arc<PoolInner<M>>,
    done: bool,
}

impl<M: Manager> Waiter<M> {
    pub(crate) fn new(rx: oneshot::Receiver<Handoff<M::Type>>, pool: Arc<PoolInner<M>>) -> Self {
        Self {
            rx,
            pool,
            done: false,
        }
    }
}

impl<M: Manager> Future for Waiter<M> {
    type Output = Handoff<M::Type>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(handoff) => {
                this.done = true;
                // A dropped sender only happens when the pool state is torn down.
                Poll::Ready(handoff.unwrap_or(Handoff::Closed))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<M: Manager> Drop for Waiter<M> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.rx.close();
        if let Ok(Handoff::Ready(entry)) = self.rx.try_recv() {
            self.pool.reclaim(entry.obj);
        }
    }
}

impl<M: Manager> fmt::Debug for Waiter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter").field("done", &self.done).finish()
    }
}
