use std::{fmt, time::Duration};

use tracing::{debug, warn};

use super::{BuildError, Manager, Pool, PoolConfig};

/// Builder for [`Pool`]s.
///
/// Instances of this are created by calling the [`Pool::builder()`] method.
#[must_use = "builder does nothing itself, use `.build()` to build it"]
pub struct PoolBuilder<M: Manager> {
    pub(crate) manager: M,
    pub(crate) config: PoolConfig,
}

// Implemented manually to avoid unnecessary trait bound on `M::Type`.
impl<M> fmt::Debug for PoolBuilder<M>
where
    M: fmt::Debug + Manager,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("manager", &self.manager)
            .field("config", &self.config)
            .finish()
    }
}

impl<M: Manager> PoolBuilder<M> {
    pub(crate) fn new(manager: M) -> Self {
        Self {
            manager,
            config: PoolConfig::default(),
        }
    }

    /// Builds the [`Pool`], creating [`PoolConfig::initial_size`] resources
    /// up front.
    ///
    /// The background opener of the pool is spawned onto the current tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// See [`BuildError`] for details. No pool is returned if a single
    /// initial resource cannot be created; the ones already created are
    /// destroyed first.
    pub async fn build(self) -> Result<Pool<M>, BuildError<M::Error>> {
        self.config.validate()?;

        let mut warm = Vec::with_capacity(self.config.initial_size);
        for _ in 0..self.config.initial_size {
            match self.manager.create().await {
                Ok(obj) => warm.push(obj),
                Err(e) => {
                    let created = warm.len();
                    for obj in warm {
                        if self.manager.destroy(obj).await.is_err() {
                            warn!("failed to destroy resource while aborting warm-up");
                        }
                    }
                    debug!(created, "pool warm-up failed");
                    return Err(BuildError::Warmup(e));
                }
            }
        }

        let pool = Pool::from_builder(self, warm);
        debug!(size = pool.len(), "pool built");
        Ok(pool)
    }

    /// Sets a [`PoolConfig`] to build the [`Pool`] with.
    pub fn config(mut self, value: PoolConfig) -> Self {
        self.config = value;
        self
    }

    /// Sets the [`PoolConfig::initial_size`].
    pub fn initial_size(mut self, value: usize) -> Self {
        self.config.initial_size = value;
        self
    }

    /// Sets the [`PoolConfig::max_idle`].
    pub fn max_idle(mut self, value: usize) -> Self {
        self.config.max_idle = value;
        self
    }

    /// Sets the [`PoolConfig::max_size`].
    ///
    /// A bounded `value` also lowers [`PoolConfig::max_idle`] to it if
    /// needed; call [`PoolBuilder::max_idle()`] afterwards to pick a smaller
    /// idle store.
    pub fn max_size(mut self, value: usize) -> Self {
        self.config.max_size = value;
        if value > 0 {
            self.config.max_idle = self.config.max_idle.min(value);
        }
        self
    }

    /// Sets the [`PoolConfig::idle_timeout`].
    pub fn idle_timeout(mut self, value: Option<Duration>) -> Self {
        self.config.idle_timeout = value;
        self
    }

    /// Sets the [`PoolConfig::opener_queue_size`].
    pub fn opener_queue_size(mut self, value: usize) -> Self {
        self.config.opener_queue_size = value;
        self
    }
}
