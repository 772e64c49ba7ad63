use std::fmt;

/// Invalid [`PoolConfig`] or incomplete [`FnManager`] setup.
///
/// [`PoolConfig`]: super::PoolConfig
/// [`FnManager`]: super::FnManager
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// More resources are requested up front than the idle store can hold.
    InitialExceedsIdle {
        /// Configured [`PoolConfig::initial_size`](super::PoolConfig::initial_size).
        initial_size: usize,
        /// Configured [`PoolConfig::max_idle`](super::PoolConfig::max_idle).
        max_idle: usize,
    },

    /// The idle store is allowed to hold more resources than may ever be
    /// alive at once.
    IdleExceedsMax {
        /// Configured [`PoolConfig::max_idle`](super::PoolConfig::max_idle).
        max_idle: usize,
        /// Configured [`PoolConfig::max_size`](super::PoolConfig::max_size).
        max_size: usize,
    },

    /// [`PoolConfig::opener_queue_size`](super::PoolConfig::opener_queue_size)
    /// is zero.
    ZeroOpenerQueue,

    /// No factory closure was supplied.
    MissingFactory,

    /// No destructor closure was supplied.
    MissingDestroy,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitialExceedsIdle {
                initial_size,
                max_idle,
            } => write!(
                f,
                "Invalid capacity settings: initial_size ({}) exceeds max_idle ({})",
                initial_size, max_idle
            ),
            Self::IdleExceedsMax { max_idle, max_size } => write!(
                f,
                "Invalid capacity settings: max_idle ({}) exceeds max_size ({})",
                max_idle, max_size
            ),
            Self::ZeroOpenerQueue => write!(f, "opener_queue_size must be greater than zero"),
            Self::MissingFactory => write!(f, "No factory function configured"),
            Self::MissingDestroy => write!(f, "No destroy function configured"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Possible errors returned by [`PoolBuilder::build()`] method.
///
/// [`PoolBuilder::build()`]: super::PoolBuilder::build
#[derive(Debug)]
pub enum BuildError<E> {
    /// The configuration was rejected before anything was created.
    Config(ConfigError),

    /// The factory failed while filling the pool with its initial resources.
    /// Every resource created before the failure has been destroyed.
    Warmup(E),
}

impl<E> From<ConfigError> for BuildError<E> {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl<E: fmt::Display> fmt::Display for BuildError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Invalid pool configuration: {}", e),
            Self::Warmup(e) => write!(f, "Factory is not able to fill the pool: {}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for BuildError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Warmup(e) => Some(e),
        }
    }
}

/// Possible errors returned by the [`Pool`] methods.
///
/// [`Pool`]: super::Pool
#[derive(Debug)]
pub enum PoolError<E> {
    /// Backend reported an error.
    Backend(E),

    /// [`Pool`] has been closed.
    ///
    /// [`Pool`]: super::Pool
    Closed,

    /// The caller was waiting for a resource and the background attempt to
    /// create one failed.
    CreateFailed,
}

impl<E> From<E> for PoolError<E> {
    fn from(e: E) -> Self {
        Self::Backend(e)
    }
}

impl<E: fmt::Display> fmt::Display for PoolError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(e) => write!(f, "Error occurred in the pool backend: {}", e),
            Self::Closed => write!(f, "Pool has been closed"),
            Self::CreateFailed => write!(f, "Failed to create a new resource"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for PoolError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Closed | Self::CreateFailed => None,
            Self::Backend(e) => Some(e),
        }
    }
}
