use std::{collections::VecDeque, fmt, sync::Arc};

use parking_lot::Mutex;
use tokio::{runtime::Handle, time::Instant};
use tracing::{debug, trace, warn};

use crate::{
    idle::{IdleEntry, IdleStore},
    opener::{self, OpenQueue, OpenRequest},
    waiter::{wait_slot, Handoff, WaitSlot, Waiter},
    Manager, PoolBuilder, PoolConfig, PoolError, PoolMetrics, Status,
};

/// Generic resource pool.
///
/// This struct can be cloned and transferred across thread boundaries and uses
/// reference counting for its internal state.
///
/// Resources are handed out by value: give them back with [`Pool::put()`]
/// or get rid of them with [`Pool::discard()`]. A resource that is simply
/// dropped keeps counting against [`PoolConfig::max_size`].
pub struct Pool<M: Manager> {
    pub(crate) inner: Arc<PoolInner<M>>,
}

// Implemented manually to avoid unnecessary trait bound on `M::Type`.
impl<M> fmt::Debug for Pool<M>
where
    M: fmt::Debug + Manager,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("inner", &self.inner).finish()
    }
}

impl<M: Manager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: Manager> Pool<M> {
    /// Instantiates a builder for a new [`Pool`].
    ///
    /// This is the only way to create a [`Pool`] instance.
    pub fn builder(manager: M) -> PoolBuilder<M> {
        PoolBuilder::new(manager)
    }

    /// Assembles a pool around already created resources and starts its
    /// background opener. Must be called from within a tokio runtime.
    pub(crate) fn from_builder(builder: PoolBuilder<M>, warm: Vec<M::Type>) -> Self {
        let PoolBuilder { manager, config } = builder;
        let idle = IdleStore::new(config.max_idle);
        let opening = warm.len();
        let metrics = PoolMetrics::default();
        for obj in warm {
            metrics.record_created();
            // `initial_size <= max_idle` was validated, so every push fits.
            let _ = idle.push(IdleEntry::new(obj));
        }
        let (queue, requests) = opener::channel(config.opener_queue_size);
        let inner = Arc::new(PoolInner {
            manager,
            config,
            state: Mutex::new(PoolState {
                idle: Some(Arc::new(idle)),
                waiters: VecDeque::new(),
                opening,
                opener: Some(queue),
                closed: false,
            }),
            metrics,
        });
        opener::spawn(Arc::downgrade(&inner), requests);
        Self { inner }
    }

    /// Retrieves a resource from this [`Pool`], creating one if there is
    /// room, or waits for one to be returned.
    ///
    /// Idle resources are checked for staleness and health before they are
    /// handed out. Rejected ones are destroyed and the lookup continues.
    ///
    /// # Errors
    ///
    /// See [`PoolError`] for details.
    pub async fn get(&self) -> Result<M::Type, PoolError<M::Error>> {
        let inner = &self.inner;
        loop {
            match inner.next_step()? {
                Step::Idle(entry) => {
                    if let Some(obj) = inner.validate(entry).await {
                        return Ok(obj);
                    }
                }
                Step::Create => return inner.create().await,
                Step::Wait(rx) => {
                    let start = Instant::now();
                    let handoff = Waiter::new(rx, inner.clone()).await;
                    inner.metrics.record_waiting(start);
                    match handoff {
                        Handoff::Ready(entry) => {
                            if entry.is_stale(inner.config.effective_idle_timeout()) {
                                debug!("discarding stale resource handed to waiter");
                                inner.discard_quietly(entry.obj).await;
                                continue;
                            }
                            return Ok(entry.obj);
                        }
                        Handoff::Failed => return Err(PoolError::CreateFailed),
                        Handoff::Closed => return Err(PoolError::Closed),
                    }
                }
            }
        }
    }

    /// Returns a resource to this [`Pool`].
    ///
    /// The oldest parked caller receives it directly. Without waiters it
    /// goes to the idle store, or is destroyed if the idle store is full or
    /// the pool is closed.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Backend`] if the resource had to be destroyed and
    /// the destructor failed.
    pub async fn put(&self, obj: M::Type) -> Result<(), PoolError<M::Error>> {
        self.inner.put(obj).await
    }

    /// Destroys a resource taken from this [`Pool`] and frees its slot,
    /// letting parked callers have a new one created for them.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Backend`] if the destructor failed. The slot is
    /// freed regardless.
    pub async fn discard(&self, obj: M::Type) -> Result<(), PoolError<M::Error>> {
        self.inner.discard(obj).await
    }

    /// Runs the [`Manager::check()`] of this [`Pool`] on a resource.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Closed`] on a closed pool and
    /// [`PoolError::Backend`] if the check failed.
    pub async fn check(&self, obj: &mut M::Type) -> Result<(), PoolError<M::Error>> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        self.inner.manager.check(obj).await.map_err(PoolError::Backend)
    }

    /// Closes this [`Pool`].
    ///
    /// All idle resources are destroyed, all parked callers get
    /// [`PoolError::Closed`] and so does every later [`Pool::get()`].
    /// Resources returned afterwards are destroyed. Calling this more than
    /// once is harmless.
    pub async fn close(&self) {
        self.inner.close().await;
    }

    /// Indicates whether this [`Pool`] has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Number of idle resources. The value may be outdated as soon as it is
    /// returned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .state
            .lock()
            .idle
            .as_ref()
            .map_or(0, |idle| idle.len())
    }

    /// Whether there are no idle resources at the moment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieves [`Status`] of this [`Pool`].
    #[must_use]
    pub fn status(&self) -> Status {
        let mut state = self.inner.state.lock();
        state.prune_waiters();
        Status {
            max_size: self.inner.config.max_size,
            max_idle: self.inner.config.max_idle,
            size: state.idle.as_ref().map_or(0, |idle| idle.len()),
            opening: state.opening,
            waiting: state.waiters.len(),
        }
    }

    /// Returns the [`PoolMetrics`] of this [`Pool`].
    #[must_use]
    pub fn metrics(&self) -> &PoolMetrics {
        &self.inner.metrics
    }

    /// Returns [`Manager`] of this [`Pool`].
    #[must_use]
    pub fn manager(&self) -> &M {
        &self.inner.manager
    }
}

/// Everything guarded by the pool lock.
struct PoolState<T> {
    /// Taken out on close.
    idle: Option<Arc<IdleStore<T>>>,
    waiters: VecDeque<WaitSlot<T>>,
    /// Resources alive or being created.
    opening: usize,
    /// Taken out on close, which stops the opener.
    opener: Option<OpenQueue>,
    closed: bool,
}

impl<T> PoolState<T> {
    /// Forgets waiters whose `get()` future was dropped.
    fn prune_waiters(&mut self) {
        self.waiters.retain(|tx| !tx.is_closed());
    }
}

impl<T> fmt::Debug for PoolState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolState")
            .field("idle", &self.idle)
            .field("waiters", &self.waiters.len())
            .field("opening", &self.opening)
            .field("closed", &self.closed)
            .finish()
    }
}

enum Step<T> {
    Idle(IdleEntry<T>),
    Create,
    Wait(tokio::sync::oneshot::Receiver<Handoff<T>>),
}

/// Outcome of routing a returned resource (or a failed creation signal).
enum Released<T> {
    Handed,
    Stored,
    /// The idle store is full.
    Overflow(T),
    Closed(T),
    /// Failed creation signal without anybody waiting for it.
    Rejected,
}

pub(crate) struct PoolInner<M: Manager> {
    manager: M,
    config: PoolConfig,
    state: Mutex<PoolState<M::Type>>,
    metrics: PoolMetrics,
}

impl<M> fmt::Debug for PoolInner<M>
where
    M: fmt::Debug + Manager,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolInner")
            .field("manager", &self.manager)
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl<M: Manager> PoolInner<M> {
    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn has_capacity(&self, state: &PoolState<M::Type>) -> bool {
        self.config.max_size == 0 || state.opening < self.config.max_size
    }

    /// Decides how the next `get()` iteration obtains a resource.
    fn next_step(&self) -> Result<Step<M::Type>, PoolError<M::Error>> {
        let idle = match &self.state.lock().idle {
            Some(idle) => idle.clone(),
            None => return Err(PoolError::Closed),
        };
        if let Some(entry) = idle.pop() {
            return Ok(Step::Idle(entry));
        }

        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::Closed);
        }
        // Returns go to the idle store under this lock, so looking again
        // here cannot miss one and park for nothing.
        if let Some(entry) = idle.pop() {
            return Ok(Step::Idle(entry));
        }
        if self.has_capacity(&state) {
            state.opening += 1;
            return Ok(Step::Create);
        }
        let (tx, rx) = wait_slot();
        state.waiters.push_back(tx);
        Ok(Step::Wait(rx))
    }

    /// Returns the resource if it is neither stale nor unhealthy, destroys
    /// it otherwise.
    async fn validate(self: &Arc<Self>, entry: IdleEntry<M::Type>) -> Option<M::Type> {
        if entry.is_stale(self.config.effective_idle_timeout()) {
            debug!("discarding stale idle resource");
            self.discard_quietly(entry.obj).await;
            return None;
        }
        let mut checkout = Checkout {
            pool: self,
            obj: Some(entry.obj),
        };
        let healthy = match checkout.obj.as_mut() {
            Some(obj) => self.manager.check(obj).await.is_ok(),
            None => false,
        };
        let obj = checkout.obj.take()?;
        if !healthy {
            debug!("discarding idle resource that failed its health check");
            self.discard_quietly(obj).await;
            return None;
        }
        Some(obj)
    }

    /// Creates a resource on the caller's task. A slot has already been
    /// reserved by [`Self::next_step()`].
    async fn create(&self) -> Result<M::Type, PoolError<M::Error>> {
        let permit = OpeningPermit { pool: self };
        match self.manager.create().await {
            Ok(obj) => {
                permit.forget();
                self.metrics.record_created();
                Ok(obj)
            }
            Err(e) => {
                drop(permit);
                self.metrics.record_create_failure();
                Err(PoolError::Backend(e))
            }
        }
    }

    /// Routes a returned resource, or the signal that a background creation
    /// failed when `obj` is [`None`]. Never blocks.
    fn release(&self, obj: Option<M::Type>) -> Released<M::Type> {
        let mut state = self.state.lock();
        if state.closed {
            return match obj {
                Some(obj) => Released::Closed(obj),
                None => Released::Rejected,
            };
        }

        let mut handoff = match obj {
            Some(obj) => Handoff::Ready(IdleEntry::new(obj)),
            None => Handoff::Failed,
        };
        while let Some(tx) = state.waiters.pop_front() {
            match tx.send(handoff) {
                Ok(()) => {
                    trace!("handed resource over to waiter");
                    return Released::Handed;
                }
                // The waiter gave up, try the next one.
                Err(h) => handoff = h,
            }
        }

        match handoff {
            Handoff::Ready(entry) => match &state.idle {
                Some(idle) => match idle.push(entry) {
                    Ok(()) => Released::Stored,
                    Err(entry) => Released::Overflow(entry.obj),
                },
                None => Released::Closed(entry.obj),
            },
            Handoff::Failed | Handoff::Closed => Released::Rejected,
        }
    }

    pub(crate) async fn put(&self, obj: M::Type) -> Result<(), PoolError<M::Error>> {
        match self.release(Some(obj)) {
            Released::Handed | Released::Stored | Released::Rejected => Ok(()),
            Released::Overflow(obj) => self.discard(obj).await,
            Released::Closed(obj) => {
                let result = self.manager.destroy(obj).await;
                self.metrics.record_destroyed();
                result.map_err(PoolError::Backend)
            }
        }
    }

    pub(crate) async fn discard(&self, obj: M::Type) -> Result<(), PoolError<M::Error>> {
        // The slot is freed even if this future is dropped mid-destroy.
        let permit = OpeningPermit { pool: self };
        let result = self.manager.destroy(obj).await;
        self.metrics.record_destroyed();
        drop(permit);
        result.map_err(PoolError::Backend)
    }

    /// Like [`Self::discard()`] but destructor failures are only logged.
    async fn discard_quietly(&self, obj: M::Type) {
        if self.discard(obj).await.is_err() {
            warn!("failed to destroy discarded resource");
        }
    }

    /// Gives back one unit of capacity and schedules creations for parked
    /// callers that can now be served.
    fn free_slot(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.opening = state.opening.saturating_sub(1);
        self.maybe_open_new(&mut state);
    }

    /// Schedules one background creation per waiter that fits under
    /// `max_size`. Capacity is reserved here, before the work is done.
    fn maybe_open_new(&self, state: &mut PoolState<M::Type>) {
        state.prune_waiters();
        let mut wanted = state.waiters.len();
        if self.config.max_size > 0 {
            wanted = wanted.min(self.config.max_size.saturating_sub(state.opening));
        }
        let queue = match &state.opener {
            Some(queue) => queue,
            None => return,
        };

        let mut scheduled = 0;
        for _ in 0..wanted {
            if queue.try_send(OpenRequest).is_err() {
                warn!(wanted, scheduled, "resource opener queue is full");
                break;
            }
            scheduled += 1;
        }
        if scheduled > 0 {
            trace!(scheduled, "scheduled background creations");
        }
        state.opening += scheduled;
    }

    /// Performs one unit of work of the background opener.
    pub(crate) async fn open_new(&self) {
        match self.manager.create().await {
            Ok(obj) => {
                self.metrics.record_created();
                if self.put(obj).await.is_err() {
                    warn!("failed to destroy freshly created resource");
                }
            }
            Err(_) => {
                self.metrics.record_create_failure();
                warn!("background resource creation failed");
                {
                    let mut state = self.state.lock();
                    state.opening = state.opening.saturating_sub(1);
                    self.maybe_open_new(&mut state);
                }
                if let Released::Rejected = self.release(None) {
                    debug!("no waiter left to notify about the failed creation");
                }
            }
        }
    }

    /// Takes back a resource that was handed to a waiter which is gone.
    pub(crate) fn reclaim(self: &Arc<Self>, obj: M::Type) {
        match self.release(Some(obj)) {
            Released::Handed | Released::Stored | Released::Rejected => {}
            Released::Overflow(obj) | Released::Closed(obj) => self.abandon(obj),
        }
    }

    /// Destroys a resource whose owning `get()` future is gone, on a
    /// separate task since there is nobody left to await it.
    fn abandon(self: &Arc<Self>, obj: M::Type) {
        if let Ok(handle) = Handle::try_current() {
            let pool = self.clone();
            let _destroy = handle.spawn(async move {
                pool.discard_quietly(obj).await;
            });
        } else {
            warn!("no runtime available to destroy an abandoned resource, dropping it");
            drop(obj);
            self.free_slot();
        }
    }

    pub(crate) async fn close(&self) {
        let (idle, waiters, opener) = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            (
                state.idle.take(),
                std::mem::take(&mut state.waiters),
                state.opener.take(),
            )
        };
        drop(opener);

        let released = waiters.len();
        for tx in waiters {
            let _ = tx.send(Handoff::Closed);
        }

        let mut drained = 0_usize;
        if let Some(idle) = idle {
            while let Some(entry) = idle.pop() {
                if self.manager.destroy(entry.obj).await.is_err() {
                    warn!("failed to destroy idle resource while closing the pool");
                }
                self.metrics.record_destroyed();
                drained += 1;
            }
        }
        debug!(drained, released, "pool closed");
    }
}

/// A resource taken out of the idle store and being checked. Destroyed on a
/// separate task if the `get()` future holding it is dropped.
struct Checkout<'a, M: Manager> {
    pool: &'a Arc<PoolInner<M>>,
    obj: Option<M::Type>,
}

impl<M: Manager> Drop for Checkout<'_, M> {
    fn drop(&mut self) {
        if let Some(obj) = self.obj.take() {
            debug!("get() dropped while checking a resource");
            self.pool.abandon(obj);
        }
    }
}

/// A reserved unit of `opening` which is given back on drop unless
/// forgotten.
struct OpeningPermit<'a, M: Manager> {
    pool: &'a PoolInner<M>,
}

impl<M: Manager> OpeningPermit<'_, M> {
    fn forget(self) {
        std::mem::forget(self);
    }
}

impl<M: Manager> Drop for OpeningPermit<'_, M> {
    fn drop(&mut self) {
        self.pool.free_slot();
    }
}

#[cfg(test)]
mod tests {
    use std::{convert::Infallible, time::Duration};

    use async_trait::async_trait;

    use super::*;

    #[derive(Debug)]
    struct Manager;

    #[async_trait]
    impl crate::Manager for Manager {
        type Type = ();
        type Error = Infallible;

        async fn create(&self) -> Result<(), Infallible> {
            Ok(())
        }

        async fn destroy(&self, _obj: ()) -> Result<(), Infallible> {
            Ok(())
        }
    }

    async fn pool(max_size: usize) -> Pool<Manager> {
        Pool::builder(Manager)
            .max_size(max_size)
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn failed_creation_signal_without_waiters_is_rejected() {
        let pool = pool(2).await;
        assert!(matches!(pool.inner.release(None), Released::Rejected));
    }

    #[tokio::test]
    async fn failed_creation_signal_wakes_oldest_waiter() {
        let pool = pool(1).await;
        let held = pool.get().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.get().await })
        };
        while pool.status().waiting == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert!(matches!(pool.inner.release(None), Released::Handed));
        assert!(matches!(
            waiter.await.unwrap(),
            Err(PoolError::CreateFailed)
        ));
        pool.put(held).await.unwrap();
    }

    #[tokio::test]
    async fn failed_creation_signal_on_closed_pool_is_rejected() {
        let pool = pool(1).await;
        pool.close().await;
        assert!(matches!(pool.inner.release(None), Released::Rejected));
    }

    #[tokio::test]
    async fn dropped_waiter_is_skipped() {
        let pool = pool(1).await;
        let held = pool.get().await.unwrap();

        let get = pool.get();
        assert!(tokio::time::timeout(Duration::from_millis(10), get)
            .await
            .is_err());

        pool.put(held).await.unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.status().waiting, 0);
    }
}
