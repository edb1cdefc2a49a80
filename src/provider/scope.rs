//! Scoped service resolution and lifecycle management.
//!
//! This module contains the Scope type, its shared cache state, and the
//! ScopeFactory handed out to services that create scopes themselves.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, warn};

use crate::activation::{downcast_list, AnyArc, Produced};
use crate::engine::ProviderEngine;
use crate::error::{DiResult, DisposeError};
use crate::internal::{dispose_all_reverse, DisposeBag};
use crate::key::{CacheKey, Key, ServiceRequest};
use crate::traits::{Dispose, Resolver, ResolverCore};

/// Cache and disposal state of one scope.
pub(crate) struct ScopeState {
    // Held across production so each cache key is produced once per scope;
    // the RefCell borrow itself is never held across production.
    resolved: ReentrantMutex<RefCell<HashMap<CacheKey, AnyArc>>>,
    disposables: Mutex<DisposeBag>,
    disposed: AtomicBool,
}

impl ScopeState {
    pub(crate) fn new() -> Self {
        Self {
            resolved: ReentrantMutex::new(RefCell::new(HashMap::new())),
            disposables: Mutex::new(DisposeBag::default()),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for ScopeState {
    fn drop(&mut self) {
        let bag = self.disposables.get_mut();
        if !bag.is_empty() {
            warn!(pending = bag.len(), "scope dropped with undisposed services; call dispose() before dropping");
        }
    }
}

/// Scoped service container for request-scoped dependency resolution.
///
/// A `Scope` caches scoped services for its own lifetime while singletons are
/// always produced and cached by the root scope. Cloning a `Scope` yields
/// another handle to the same scope.
///
/// # Lifetime Behavior
///
/// - **Singleton**: produced once in the root scope, shared by every scope
/// - **Scoped**: produced once per scope
/// - **Transient**: produced on every resolution; disposables are captured by
///   the resolving scope
///
/// # Examples
///
/// ```
/// use aspect_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct DatabaseConnection(String);
///
/// struct UserService {
///     db: Arc<DatabaseConnection>,
/// }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_scoped_factory::<DatabaseConnection, _>(|_| {
///     DatabaseConnection("connection-123".to_string())
/// });
/// collection.add_transient_factory::<UserService, _>(|resolver| {
///     UserService { db: resolver.get_required::<DatabaseConnection>() }
/// });
///
/// let provider = collection.build();
/// let scope = provider.create_scope();
///
/// // Services in the same scope share the scoped connection
/// let user1 = scope.get_required::<UserService>();
/// let user2 = scope.get_required::<UserService>();
/// assert!(Arc::ptr_eq(&user1.db, &user2.db));
///
/// let other = provider.create_scope();
/// assert!(!Arc::ptr_eq(&user1.db, &other.get_required::<UserService>().db));
/// ```
#[derive(Clone)]
pub struct Scope {
    pub(crate) engine: Arc<ProviderEngine>,
    pub(crate) state: Arc<ScopeState>,
}

impl Scope {
    pub(crate) fn new(engine: Arc<ProviderEngine>, state: Arc<ScopeState>) -> Self {
        Self { engine, state }
    }

    /// Whether this is the provider's root scope.
    pub fn is_root(&self) -> bool {
        Arc::ptr_eq(&self.state, &self.engine.root)
    }

    /// Handle to the root scope that owns singletons.
    pub(crate) fn root(&self) -> Scope {
        Scope::new(self.engine.clone(), self.engine.root.clone())
    }

    /// Creates a sibling scope with its own scoped cache.
    pub fn create_scope(&self) -> Scope {
        Scope::new(self.engine.clone(), Arc::new(ScopeState::new()))
    }

    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    /// Disposes captured services in reverse capture order and releases the
    /// scope's cache.
    ///
    /// Every disposable is attempted; failures are returned together. Later
    /// calls are no-ops and any resolution afterwards fails with
    /// [`DiError::Disposed`](crate::DiError::Disposed).
    ///
    /// Disposing from inside a production of this scope releases the cache
    /// immediately; the instance being produced is handed to its caller but
    /// never cached.
    pub fn dispose(&self) -> Result<(), DisposeError> {
        if self.state.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let entries = self.state.disposables.lock().take();
        debug!(root = self.is_root(), disposables = entries.len(), "disposing scope");
        let result = dispose_all_reverse(entries);

        let released = {
            let resolved = self.state.resolved.lock();
            let taken = resolved.try_borrow_mut().map(|mut cache| std::mem::take(&mut *cache));
            taken.unwrap_or_else(|_| {
                warn!("scope cache is in use on this thread, cached services are released after the current production");
                HashMap::new()
            })
        };
        drop(released);

        if self.is_root() {
            self.engine.clear_realized();
        }
        result
    }

    /// Captures `disposable` for disposal with this scope. A disposed scope
    /// disposes it immediately.
    pub(crate) fn capture(&self, disposable: Arc<dyn Dispose>) {
        if self.is_disposed() {
            if let Err(error) = disposable.dispose() {
                warn!(%error, "disposable captured after scope disposal failed");
            }
            return;
        }
        self.state.disposables.lock().push(disposable);
    }

    pub(crate) fn capture_produced(&self, produced: Produced) -> AnyArc {
        if let Some(disposable) = produced.disposable {
            self.capture(disposable);
        }
        produced.value
    }

    /// Returns the value cached under `cache_key`, producing and capturing it
    /// on first use.
    pub(crate) fn get_or_produce<F>(&self, cache_key: CacheKey, produce: F) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<Produced>,
    {
        let resolved = self.state.resolved.lock();
        if let Some(value) = resolved.borrow().get(&cache_key) {
            return Ok(value.clone());
        }

        let value = self.capture_produced(produce()?);
        // Disposed during production on this thread; keep the cache released
        if self.is_disposed() {
            resolved.borrow_mut().clear();
            return Ok(value);
        }
        let mut cache = resolved.borrow_mut();
        Ok(cache.entry(cache_key).or_insert(value).clone())
    }

    /// Number of cached scoped or singleton instances.
    pub fn cached_count(&self) -> usize {
        let resolved = self.state.resolved.lock();
        let count = resolved.borrow().len();
        count
    }

    /// Number of disposables awaiting disposal.
    pub fn pending_disposals(&self) -> usize {
        self.state.disposables.lock().len()
    }
}

impl ResolverCore for Scope {
    fn try_resolve_any(&self, key: &Key) -> DiResult<Option<AnyArc>> {
        self.engine.get_service(ServiceRequest::Single(*key), self)
    }

    fn resolve_many(&self, key: &Key) -> DiResult<Vec<AnyArc>> {
        match self.engine.get_service(ServiceRequest::All(*key), self)? {
            Some(list) => downcast_list(list),
            None => Ok(Vec::new()),
        }
    }

    fn capture_disposable(&self, disposable: Arc<dyn Dispose>) {
        self.capture(disposable);
    }
}

impl Resolver for Scope {}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("root", &self.is_root())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Creates scopes of the provider it was resolved from.
///
/// Resolvable as a service, so long-lived components can open their own
/// scopes without holding the provider.
///
/// ```
/// use aspect_di::{Resolver, ScopeFactory, ServiceCollection};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// static NEXT: AtomicUsize = AtomicUsize::new(0);
/// struct RequestId(usize);
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_factory::<RequestId, _>(|_| RequestId(NEXT.fetch_add(1, Ordering::SeqCst)));
///
/// let provider = services.build();
/// let factory = provider.get_required::<ScopeFactory>();
/// let first = factory.create_scope().get_required::<RequestId>();
/// let second = factory.create_scope().get_required::<RequestId>();
/// assert_ne!(first.0, second.0);
/// ```
#[derive(Clone)]
pub struct ScopeFactory {
    engine: Arc<ProviderEngine>,
}

impl ScopeFactory {
    pub(crate) fn new(engine: Arc<ProviderEngine>) -> Self {
        Self { engine }
    }

    pub fn create_scope(&self) -> Scope {
        Scope::new(self.engine.clone(), Arc::new(ScopeState::new()))
    }
}

impl fmt::Debug for ScopeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeFactory").finish_non_exhaustive()
    }
}
