use std::time::Duration;

use crate::ConfigError;

/// Default capacity of the channel feeding the background opener.
pub(crate) const DEFAULT_OPENER_QUEUE_SIZE: usize = 1_000_000;

/// [`Pool`] configuration.
///
/// [`Pool`]: super::Pool
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(from = "PoolConfigDef"))]
pub struct PoolConfig {
    /// Number of resources created eagerly when the [`Pool`] is built.
    ///
    /// [`Pool`]: super::Pool
    pub initial_size: usize,

    /// Maximum number of idle resources kept by the [`Pool`]. Resources
    /// returned while the idle store is full are destroyed.
    ///
    /// Follows `max_size` when left out of a deserialized config.
    ///
    /// [`Pool`]: super::Pool
    pub max_idle: usize,

    /// Maximum number of resources alive or being created at the same time.
    /// `0` means unbounded.
    pub max_size: usize,

    /// Idle resources older than this are destroyed instead of being handed
    /// out. [`None`] or a zero duration disables the check.
    pub idle_timeout: Option<Duration>,

    /// Capacity of the work channel of the background opener.
    pub opener_queue_size: usize,
}

impl PoolConfig {
    /// Creates a new [`PoolConfig`] without an idle timeout, with no initial
    /// resources and with both `max_size` and `max_idle` set to the provided
    /// `max_size`.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            initial_size: 0,
            max_idle: max_size,
            max_size,
            idle_timeout: None,
            opener_queue_size: DEFAULT_OPENER_QUEUE_SIZE,
        }
    }

    /// Checks `initial_size <= max_idle <= max_size` (the latter only when
    /// `max_size` is bounded).
    ///
    /// # Errors
    ///
    /// See [`ConfigError`] for details.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_size > self.max_idle {
            return Err(ConfigError::InitialExceedsIdle {
                initial_size: self.initial_size,
                max_idle: self.max_idle,
            });
        }
        if self.max_size > 0 && self.max_idle > self.max_size {
            return Err(ConfigError::IdleExceedsMax {
                max_idle: self.max_idle,
                max_size: self.max_size,
            });
        }
        if self.opener_queue_size == 0 {
            return Err(ConfigError::ZeroOpenerQueue);
        }
        Ok(())
    }

    pub(crate) fn effective_idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout.filter(|d| !d.is_zero())
    }
}

impl Default for PoolConfig {
    /// Creates a new [`PoolConfig`] with the `max_size` being set to
    /// `cpu_count * 4` ignoring any logical CPUs (Hyper-Threading).
    fn default() -> Self {
        Self::new(num_cpus::get_physical() * 4)
    }
}

/// Deserialized form of [`PoolConfig`] where missing fields take their
/// defaults and a missing `max_idle` follows `max_size`.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct PoolConfigDef {
    #[serde(default)]
    initial_size: usize,
    #[serde(default)]
    max_idle: Option<usize>,
    #[serde(default = "default_max_size")]
    max_size: usize,
    #[serde(default)]
    idle_timeout: Option<Duration>,
    #[serde(default = "default_opener_queue_size")]
    opener_queue_size: usize,
}

#[cfg(feature = "serde")]
fn default_max_size() -> usize {
    PoolConfig::default().max_size
}

#[cfg(feature = "serde")]
fn default_opener_queue_size() -> usize {
    DEFAULT_OPENER_QUEUE_SIZE
}

#[cfg(feature = "serde")]
impl From<PoolConfigDef> for PoolConfig {
    fn from(def: PoolConfigDef) -> Self {
        Self {
            initial_size: def.initial_size,
            max_idle: def.max_idle.unwrap_or(def.max_size),
            max_size: def.max_size,
            idle_timeout: def.idle_timeout,
            opener_queue_size: def.opener_queue_size,
        }
    }
}
