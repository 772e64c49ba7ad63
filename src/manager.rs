use std::fmt;

use async_trait::async_trait;

use crate::{ConfigError, Manager};

type CreateFn<T, E> = Box<dyn Fn() -> Result<T, E> + Send + Sync>;
type DestroyFn<T, E> = Box<dyn Fn(T) -> Result<(), E> + Send + Sync>;
type CheckFn<T, E> = Box<dyn Fn(&mut T) -> Result<(), E> + Send + Sync>;

/// [`Manager`] assembled from plain closures.
///
/// Handy when the resource has no dedicated manager type. The closures run
/// on the async executor, so they should not block for long.
pub struct FnManager<T, E> {
    create: CreateFn<T, E>,
    destroy: DestroyFn<T, E>,
    check: Option<CheckFn<T, E>>,
}

impl<T, E> FnManager<T, E> {
    /// Instantiates a builder for a new [`FnManager`].
    pub fn builder() -> FnManagerBuilder<T, E> {
        FnManagerBuilder {
            create: None,
            destroy: None,
            check: None,
        }
    }
}

impl<T, E> fmt::Debug for FnManager<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnManager")
            .field("check", &self.check.is_some())
            .finish()
    }
}

#[async_trait]
impl<T, E> Manager for FnManager<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Type = T;
    type Error = E;

    async fn create(&self) -> Result<T, E> {
        (self.create)()
    }

    async fn destroy(&self, obj: T) -> Result<(), E> {
        (self.destroy)(obj)
    }

    async fn check(&self, obj: &mut T) -> Result<(), E> {
        match &self.check {
            Some(check) => check(obj),
            None => Ok(()),
        }
    }
}

/// Builder for [`FnManager`]s.
///
/// The factory and the destructor are required, the health check is
/// optional.
#[must_use = "builder does nothing itself, use `.build()` to build it"]
pub struct FnManagerBuilder<T, E> {
    create: Option<CreateFn<T, E>>,
    destroy: Option<DestroyFn<T, E>>,
    check: Option<CheckFn<T, E>>,
}

impl<T, E> fmt::Debug for FnManagerBuilder<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnManagerBuilder")
            .field("create", &self.create.is_some())
            .field("destroy", &self.destroy.is_some())
            .field("check", &self.check.is_some())
            .finish()
    }
}

impl<T, E> FnManagerBuilder<T, E> {
    /// Sets the factory.
    pub fn create<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        self.create = Some(Box::new(f));
        self
    }

    /// Sets the destructor.
    pub fn destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(T) -> Result<(), E> + Send + Sync + 'static,
    {
        self.destroy = Some(Box::new(f));
        self
    }

    /// Sets the health check.
    pub fn check<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), E> + Send + Sync + 'static,
    {
        self.check = Some(Box::new(f));
        self
    }

    /// Builds the [`FnManager`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFactory`] or
    /// [`ConfigError::MissingDestroy`] if a required closure was not set.
    pub fn build(self) -> Result<FnManager<T, E>, ConfigError> {
        Ok(FnManager {
            create: self.create.ok_or(ConfigError::MissingFactory)?,
            destroy: self.destroy.ok_or(ConfigError::MissingDestroy)?,
            check: self.check,
        })
    }
}
