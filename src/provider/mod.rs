//! Service provider module for dependency injection.
//!
//! This module contains the ServiceProvider type and related functionality
//! for resolving registered services from the DI container.

use std::fmt;
use std::sync::Arc;

use crate::activation::AnyArc;
use crate::call_site::CallSite;
use crate::descriptors::ServiceDescriptor;
use crate::engine::ProviderEngine;
use crate::error::{DiResult, DisposeError};
use crate::interception::{InterceptionRegistry, Interception};
use crate::key::{Key, ServiceRequest};
use crate::traits::{Dispose, Resolver, ResolverCore};

pub mod context;
pub mod options;
pub mod scope;

pub use context::ResolverContext;
pub use options::{ServiceProviderOptions, ENV_PREFIX};
pub use scope::{Scope, ScopeFactory};
pub(crate) use scope::ScopeState;

/// Service provider for resolving dependencies from the DI container.
///
/// The provider owns the root scope. Singletons are produced and cached there,
/// and resolving through the provider itself resolves from the root scope.
/// Scoped services should be resolved from a scope created with
/// [`create_scope`](Self::create_scope); with scope validation on, resolving
/// them from the root fails.
///
/// # Thread Safety
///
/// ServiceProvider is thread-safe and cheap to clone; clones share the same
/// root scope, call-site cache and realized services.
///
/// # Examples
///
/// ```
/// use aspect_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton(Database { url: "postgres://localhost".to_string() });
/// collection.add_transient_factory::<UserService, _>(|resolver| {
///     UserService { db: resolver.get_required::<Database>() }
/// });
///
/// let provider = collection.build();
/// let user_service = provider.get_required::<UserService>();
/// assert_eq!(user_service.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    root: Scope,
}

impl ServiceProvider {
    pub(crate) fn new(
        descriptors: Vec<ServiceDescriptor>,
        interception: Interception,
        options: ServiceProviderOptions,
    ) -> Self {
        let engine = Arc::new(ProviderEngine::new(descriptors, interception, options));
        let root = engine.root.clone();
        Self { root: Scope::new(engine, root) }
    }

    /// Creates a new scope for resolving scoped services.
    ///
    /// Each scope keeps its own cache of scoped services and its own captured
    /// disposables, while singletons come from the root scope.
    ///
    /// # Examples
    ///
    /// ```
    /// use aspect_di::{ServiceCollection, Resolver};
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// struct RequestId(String);
    ///
    /// let mut collection = ServiceCollection::new();
    /// let counter = Arc::new(AtomicUsize::new(0));
    /// let counter_clone = counter.clone();
    ///
    /// collection.add_scoped_factory::<RequestId, _>(move |_| {
    ///     let n = counter_clone.fetch_add(1, Ordering::SeqCst) + 1;
    ///     RequestId(format!("req-{}", n))
    /// });
    ///
    /// let provider = collection.build();
    ///
    /// let scope1 = provider.create_scope();
    /// let scope2 = provider.create_scope();
    ///
    /// let req1a = scope1.get_required::<RequestId>();
    /// let req1b = scope1.get_required::<RequestId>();
    /// let req2 = scope2.get_required::<RequestId>();
    ///
    /// assert!(Arc::ptr_eq(&req1a, &req1b));
    /// assert!(!Arc::ptr_eq(&req1a, &req2));
    /// assert_eq!(counter.load(Ordering::SeqCst), 2);
    /// ```
    pub fn create_scope(&self) -> Scope {
        self.root.create_scope()
    }

    /// The root scope backing this provider.
    pub fn root_scope(&self) -> &Scope {
        &self.root
    }

    pub fn scope_factory(&self) -> ScopeFactory {
        ScopeFactory::new(self.root.engine.clone())
    }

    pub fn options(&self) -> &ServiceProviderOptions {
        &self.root.engine.options
    }

    /// Builds (or returns the cached) call-site graph of `request` without
    /// producing anything. `Ok(None)` when the service is not registered.
    ///
    /// ```
    /// use aspect_di::{key_of_type, CallSiteType, ServiceCollection, ServiceRequest};
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_factory::<String, _>(|_| "scoped".to_string());
    ///
    /// let provider = services.build();
    /// let site = provider.call_site(ServiceRequest::Single(key_of_type::<String>())).unwrap().unwrap();
    /// assert_eq!(site.call_site_type(), CallSiteType::Scoped);
    /// assert_eq!(site.children()[0].call_site_type(), CallSiteType::Factory);
    /// assert!(provider.call_site(ServiceRequest::Single(key_of_type::<u8>())).unwrap().is_none());
    /// ```
    pub fn call_site(&self, request: ServiceRequest) -> DiResult<Option<Arc<CallSite>>> {
        self.root.engine.call_site(request)
    }

    /// The descriptors this provider was built from, in registration order.
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        self.root.engine.call_sites.descriptors()
    }

    /// The interception registry consulted by this provider.
    pub fn interception_registry(&self) -> &Arc<InterceptionRegistry> {
        self.root.engine.interception.registry()
    }

    /// Disposes the root scope: every singleton and root-resolved transient
    /// disposable, in reverse capture order. Resolution fails with
    /// [`DiError::Disposed`](crate::DiError::Disposed) afterwards, from the
    /// provider and from every scope.
    pub fn dispose(&self) -> Result<(), DisposeError> {
        self.root.dispose()
    }

    pub fn is_disposed(&self) -> bool {
        self.root.is_disposed()
    }
}

impl ResolverCore for ServiceProvider {
    fn try_resolve_any(&self, key: &Key) -> DiResult<Option<AnyArc>> {
        self.root.try_resolve_any(key)
    }

    fn resolve_many(&self, key: &Key) -> DiResult<Vec<AnyArc>> {
        self.root.resolve_many(key)
    }

    fn capture_disposable(&self, disposable: Arc<dyn Dispose>) {
        self.root.capture_disposable(disposable);
    }
}

impl Resolver for ServiceProvider {}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("descriptors", &self.descriptors().len())
            .field("options", self.options())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
