#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links
)]
#![warn(clippy::pedantic)]
#![warn(
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::match_same_arms
)]

mod builder;
mod config;
mod errors;
mod idle;
mod manager;
mod metrics;
mod opener;
mod pool;
mod waiter;

pub use self::{
    builder::PoolBuilder,
    config::PoolConfig,
    errors::{BuildError, ConfigError, PoolError},
    manager::{FnManager, FnManagerBuilder},
    metrics::PoolMetrics,
    pool::Pool,
};

use async_trait::async_trait;

/// The current pool status.
#[derive(Clone, Copy, Debug)]
pub struct Status {
    /// The maximum number of live resources, `0` if unbounded.
    pub max_size: usize,

    /// The capacity of the idle store.
    pub max_idle: usize,

    /// The current resources idle in the pool.
    pub size: usize,

    /// Resources currently alive or being created.
    pub opening: usize,

    /// Callers currently parked waiting for a resource.
    pub waiting: usize,
}

/// Manager responsible for creating, destroying and checking the resources
/// of a [`Pool`].
#[async_trait]
pub trait Manager: Sync + Send + 'static {
    /// Type of resources that this [`Manager`] creates.
    type Type: Send + 'static;
    /// Error that this [`Manager`] can return when creating, destroying or
    /// checking resources.
    type Error: Send + 'static;

    /// Creates a new instance of [`Manager::Type`].
    async fn create(&self) -> Result<Self::Type, Self::Error>;

    /// Releases an instance of [`Manager::Type`] for good.
    ///
    /// Failures are reported to callers of [`Pool::put()`] and
    /// [`Pool::discard()`], but the resource always stops counting against
    /// the pool size.
    async fn destroy(&self, obj: Self::Type) -> Result<(), Self::Error>;

    /// Checks whether an idle instance is still usable.
    ///
    /// The default implementation accepts every instance.
    async fn check(&self, _obj: &mut Self::Type) -> Result<(), Self::Error> {
        Ok(())
    }
}
