//! Resolver traits for service resolution.

use std::any::{type_name, Any};
use std::sync::Arc;

use crate::activation::{downcast_service, downcast_trait};
use crate::error::{DiError, DiResult};
use crate::key::{key_of_trait, key_of_type, Key};
use crate::traits::Dispose;

/// Core resolver trait for object-safe service resolution.
///
/// Implemented by [`ServiceProvider`](crate::ServiceProvider),
/// [`Scope`](crate::Scope) and the [`ResolverContext`](crate::ResolverContext)
/// handed to factories. Most users should use the [`Resolver`] trait instead,
/// which provides typed methods on top of this one.
pub trait ResolverCore: Send + Sync {
    /// Resolves the last registration of `key`, or `Ok(None)` when the service
    /// is not registered.
    fn try_resolve_any(&self, key: &Key) -> DiResult<Option<Arc<dyn Any + Send + Sync>>>;

    /// Resolves every registration of `key` in registration order. An
    /// unregistered service yields an empty vector.
    fn resolve_many(&self, key: &Key) -> DiResult<Vec<Arc<dyn Any + Send + Sync>>>;

    /// Captures a disposable in the resolving scope.
    ///
    /// Factories use this for instances they build themselves; the container
    /// captures [`Injectable`](crate::Injectable) instances on its own.
    fn capture_disposable(&self, disposable: Arc<dyn Dispose>);

    /// Resolves the last registration of `key`.
    ///
    /// * `Err(DiError::NotFound)` - the service is not registered
    fn resolve_any(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>> {
        self.try_resolve_any(key)?.ok_or(DiError::NotFound(key.display_name()))
    }
}

/// High-level resolver interface with generic methods for type-safe service resolution.
///
/// # Examples
///
/// ```
/// use aspect_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str) -> String;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) -> String { format!("LOG: {}", msg) }
/// }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton(42usize);
/// collection.add_singleton_trait::<dyn Logger>(Arc::new(ConsoleLogger));
///
/// let provider = collection.build();
/// assert_eq!(*provider.get_required::<usize>(), 42);
/// assert_eq!(provider.get_required_trait::<dyn Logger>().log("ready"), "LOG: ready");
/// assert!(provider.try_get::<String>().unwrap().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete service type.
    fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve_any(&key_of_type::<T>())?;
        downcast_service::<T>(any)
    }

    /// Resolves a concrete service type, `Ok(None)` when not registered.
    fn try_get<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.try_resolve_any(&key_of_type::<T>())?.map(downcast_service::<T>).transpose()
    }

    /// Resolves a trait service, e.g. `get_trait::<dyn Logger>()`.
    fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve_any(&key_of_trait::<T>())?;
        downcast_trait::<T>(any)
    }

    /// Resolves a trait service, `Ok(None)` when not registered.
    fn try_get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.try_resolve_any(&key_of_trait::<T>())?.map(downcast_trait::<T>).transpose()
    }

    /// Resolves every registration of a concrete type, in registration order.
    fn get_all<T: Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve_many(&key_of_type::<T>())?.into_iter().map(downcast_service::<T>).collect()
    }

    /// Resolves every registration of a trait, in registration order.
    fn get_all_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve_many(&key_of_trait::<T>())?.into_iter().map(downcast_trait::<T>).collect()
    }

    /// Resolves a concrete service, panicking on failure.
    fn get_required<T: Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", type_name::<T>(), e))
    }

    /// Resolves a trait service, panicking on failure.
    fn get_required_trait<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.get_trait::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve trait {}: {}", type_name::<T>(), e))
    }

    /// Captures `service` for disposal by the resolving scope.
    fn register_disposer<T: Dispose>(&self, service: Arc<T>) {
        self.capture_disposable(service);
    }
}
