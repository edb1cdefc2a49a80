//! Disposal trait for resource cleanup.

use crate::error::BoxError;

/// Trait for synchronous resource disposal.
///
/// Implement this trait for services that need structured teardown (flushing
/// caches, closing connections). A scope runs the disposables it captured in
/// reverse capture order when it is disposed. A failing disposer does not stop
/// the others; the failures are returned together as a
/// [`DisposeError`](crate::DisposeError).
///
/// # Examples
///
/// ```
/// use aspect_di::{BoxError, Dispose, ServiceCollection, Resolver};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Cache {
///     flushed: AtomicBool,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) -> Result<(), BoxError> {
///         self.flushed.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_factory::<Cache, _>(|_| Cache { flushed: AtomicBool::new(false) });
/// services.add_scoped_factory::<Arc<Cache>, _>(|resolver| {
///     let cache = resolver.get_required::<Cache>();
///     resolver.register_disposer(cache.clone());
///     cache
/// });
///
/// let provider = services.build();
/// let scope = provider.create_scope();
/// let cache = scope.get_required::<Arc<Cache>>();
/// scope.dispose().unwrap();
/// assert!(cache.flushed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self) -> Result<(), BoxError>;
}
