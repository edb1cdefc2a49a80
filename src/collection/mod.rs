//! Service collection module for dependency injection.
//!
//! This module contains the ServiceCollection type: the ordered descriptor
//! list a provider is built from, plus the proxy factories and interception
//! registry the provider will use.

use std::sync::Arc;

use tracing::debug;

use crate::activation::Injectable;
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::interception::{InterceptionRegistry, Interception, InterceptorChain, ProxyRegistry};
use crate::key::{key_of_trait, key_of_type, Key};
use crate::lifetime::Lifetime;
use crate::provider::{ResolverContext, ServiceProvider, ServiceProviderOptions};

/// Ordered service registrations.
///
/// For single-instance resolution the last registration of a service wins;
/// resolving every registration (`get_all`, `param_all`) yields them all in
/// registration order.
///
/// # Examples
///
/// ```rust
/// use aspect_di::{Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// trait Plugin: Send + Sync {
///     fn name(&self) -> &'static str;
/// }
/// struct Audit;
/// struct Metrics;
/// impl Plugin for Audit { fn name(&self) -> &'static str { "audit" } }
/// impl Plugin for Metrics { fn name(&self) -> &'static str { "metrics" } }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_trait::<dyn Plugin>(Arc::new(Audit));
/// services.add_singleton_trait::<dyn Plugin>(Arc::new(Metrics));
///
/// let provider = services.build();
/// assert_eq!(provider.get_required_trait::<dyn Plugin>().name(), "metrics");
/// let names: Vec<_> = provider.get_all_trait::<dyn Plugin>().unwrap().iter().map(|p| p.name()).collect();
/// assert_eq!(names, vec!["audit", "metrics"]);
/// ```
#[derive(Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
    proxies: ProxyRegistry,
    interception: Option<Arc<InterceptionRegistry>>,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self::default()
    }

    // ----- Descriptor list -----

    /// Appends a descriptor.
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Appends `descriptor` unless its service is already registered.
    /// Returns whether it was added.
    pub fn try_add(&mut self, descriptor: ServiceDescriptor) -> bool {
        if self.contains_key(&descriptor.key()) {
            return false;
        }
        self.descriptors.push(descriptor);
        true
    }

    /// Appends `descriptor` unless a registration of the same service with the
    /// same implementation exists. Returns whether it was added.
    ///
    /// Fails when the implementation cannot be told apart from the service
    /// itself, as with instances and factories of a concrete type.
    ///
    /// ```rust
    /// use aspect_di::{Constructor, Injectable, Lifetime, ServiceCollection, ServiceDescriptor};
    /// use std::sync::Arc;
    ///
    /// trait Handler: Send + Sync {}
    /// struct Audit;
    /// impl Handler for Audit {}
    /// impl Injectable for Audit {
    ///     fn constructors() -> Vec<Constructor<Self>> {
    ///         vec![Constructor::new(|_| Ok(Audit))]
    ///     }
    /// }
    ///
    /// let audit = || {
    ///     ServiceDescriptor::trait_implementation::<dyn Handler, Audit, _>(Lifetime::Transient, |a| a as Arc<dyn Handler>)
    /// };
    ///
    /// let mut services = ServiceCollection::new();
    /// assert!(services.try_add_enumerable(audit()).unwrap());
    /// assert!(!services.try_add_enumerable(audit()).unwrap());
    /// assert!(services.try_add_enumerable(ServiceDescriptor::factory::<u8, _>(Lifetime::Transient, |_| 1)).is_err());
    /// assert_eq!(services.len(), 1);
    /// ```
    pub fn try_add_enumerable(&mut self, descriptor: ServiceDescriptor) -> DiResult<bool> {
        if descriptor.implementation_name() == descriptor.service_name() {
            return Err(DiError::Registration(format!(
                "implementation of {} cannot be distinguished from the service type",
                descriptor.service_name()
            )));
        }
        let exists = self.descriptors.iter().any(|existing| {
            existing.key() == descriptor.key() && existing.implementation_name() == descriptor.implementation_name()
        });
        if exists {
            return Ok(false);
        }
        self.descriptors.push(descriptor);
        Ok(true)
    }

    /// Replaces the first registration of the descriptor's service, or appends
    /// it when the service is not registered.
    pub fn replace(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        let key = descriptor.key();
        match self.descriptors.iter().position(|existing| existing.key() == key) {
            Some(index) => self.descriptors[index] = descriptor,
            None => self.descriptors.push(descriptor),
        }
        self
    }

    /// Removes every registration of `key`, returning how many were removed.
    pub fn remove_all_key(&mut self, key: &Key) -> usize {
        let before = self.descriptors.len();
        self.descriptors.retain(|descriptor| descriptor.key() != *key);
        before - self.descriptors.len()
    }

    pub fn remove_all<T: Send + Sync + 'static>(&mut self) -> usize {
        self.remove_all_key(&key_of_type::<T>())
    }

    pub fn remove_all_trait<T: ?Sized + Send + Sync + 'static>(&mut self) -> usize {
        self.remove_all_key(&key_of_trait::<T>())
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.descriptors.iter().any(|descriptor| descriptor.key() == *key)
    }

    /// Registered descriptors in registration order.
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    // ----- Concrete Type Registrations -----

    /// Registers a singleton instance shared across the entire application.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use aspect_di::{Resolver, ServiceCollection};
    /// struct Config {
    ///     database_url: String
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Config {
    ///     database_url: "postgres://localhost".to_string()
    /// });
    /// let config = services.build().get_required::<Config>();
    /// assert_eq!(config.database_url, "postgres://localhost");
    /// ```
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.add(ServiceDescriptor::instance(value))
    }

    /// Registers a factory producing `T` with the given lifetime.
    pub fn add_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory::<T, F>(lifetime, factory))
    }

    /// Registers a fallible factory. An `Err` reaches the caller unchanged and
    /// nothing is cached.
    ///
    /// ```rust
    /// use aspect_di::{DiError, Lifetime, Resolver, ServiceCollection};
    ///
    /// #[derive(Debug)]
    /// struct Offline;
    /// impl std::fmt::Display for Offline {
    ///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str("offline") }
    /// }
    /// impl std::error::Error for Offline {}
    ///
    /// struct Connection;
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_try_factory::<Connection, _>(Lifetime::Singleton, |_| Err(DiError::failed(Offline)));
    ///
    /// let err = services.build().get::<Connection>().err().unwrap();
    /// assert_eq!(err.to_string(), "offline");
    /// assert!(err.cause().unwrap().is::<Offline>());
    /// ```
    pub fn add_try_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::try_factory::<T, F>(lifetime, factory))
    }

    /// Registers a singleton factory called once, on first resolution.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use aspect_di::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// struct Database { url: String }
    /// struct UserService { db: Arc<Database> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Database { url: "postgres://localhost".to_string() });
    /// services.add_singleton_factory::<UserService, _>(|resolver| {
    ///     UserService { db: resolver.get_required::<Database>() }
    /// });
    ///
    /// let provider = services.build();
    /// let first = provider.get_required::<UserService>();
    /// let second = provider.create_scope().get_required::<UserService>();
    /// assert!(Arc::ptr_eq(&first, &second));
    /// ```
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> T + Send + Sync + 'static,
    {
        self.add_factory::<T, F>(Lifetime::Singleton, factory)
    }

    /// Registers a factory called once per scope.
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> T + Send + Sync + 'static,
    {
        self.add_factory::<T, F>(Lifetime::Scoped, factory)
    }

    /// Registers a factory called on every resolution.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> T + Send + Sync + 'static,
    {
        self.add_factory::<T, F>(Lifetime::Transient, factory)
    }

    /// Registers an [`Injectable`] type activated by the container.
    pub fn add_type<I: Injectable>(&mut self, lifetime: Lifetime) -> &mut Self {
        self.add(ServiceDescriptor::implementation::<I>(lifetime))
    }

    pub fn add_singleton_type<I: Injectable>(&mut self) -> &mut Self {
        self.add_type::<I>(Lifetime::Singleton)
    }

    pub fn add_scoped_type<I: Injectable>(&mut self) -> &mut Self {
        self.add_type::<I>(Lifetime::Scoped)
    }

    pub fn add_transient_type<I: Injectable>(&mut self) -> &mut Self {
        self.add_type::<I>(Lifetime::Transient)
    }

    // ----- Trait Registrations -----

    /// Registers a singleton trait implementation.
    ///
    /// ```rust
    /// use aspect_di::{Resolver, ServiceCollection};
    /// use std::sync::Arc;
    ///
    /// trait Clock: Send + Sync { fn now(&self) -> u64; }
    /// struct Fixed;
    /// impl Clock for Fixed { fn now(&self) -> u64 { 7 } }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_trait::<dyn Clock>(Arc::new(Fixed));
    /// assert_eq!(services.build().get_required_trait::<dyn Clock>().now(), 7);
    /// ```
    pub fn add_singleton_trait<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) -> &mut Self {
        self.add(ServiceDescriptor::trait_instance(value))
    }

    /// Registers a trait factory with the given lifetime.
    pub fn add_trait_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> Arc<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::trait_factory::<T, F>(lifetime, factory))
    }

    /// Registers a fallible trait factory.
    pub fn add_try_trait_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::try_trait_factory::<T, F>(lifetime, factory))
    }

    pub fn add_singleton_trait_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> Arc<T> + Send + Sync + 'static,
    {
        self.add_trait_factory::<T, F>(Lifetime::Singleton, factory)
    }

    pub fn add_scoped_trait_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> Arc<T> + Send + Sync + 'static,
    {
        self.add_trait_factory::<T, F>(Lifetime::Scoped, factory)
    }

    pub fn add_transient_trait_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> Arc<T> + Send + Sync + 'static,
    {
        self.add_trait_factory::<T, F>(Lifetime::Transient, factory)
    }

    /// Registers an [`Injectable`] type as the implementation of trait `S`.
    ///
    /// ```rust
    /// use aspect_di::{Constructor, Injectable, Resolver, ServiceCollection};
    /// use std::sync::Arc;
    ///
    /// trait Greeter: Send + Sync { fn greet(&self) -> String; }
    ///
    /// struct Polite { name: Arc<String> }
    /// impl Greeter for Polite {
    ///     fn greet(&self) -> String { format!("Good day, {}", self.name) }
    /// }
    /// impl Injectable for Polite {
    ///     fn constructors() -> Vec<Constructor<Self>> {
    ///         vec![Constructor::new(|args| Ok(Polite { name: args.next()? })).param::<String>()]
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton("Ada".to_string());
    /// services.add_scoped_trait_type::<dyn Greeter, Polite, _>(|p| p as Arc<dyn Greeter>);
    ///
    /// let scope = services.build().create_scope();
    /// assert_eq!(scope.get_required_trait::<dyn Greeter>().greet(), "Good day, Ada");
    /// ```
    pub fn add_trait_type<S, I, U>(&mut self, lifetime: Lifetime, upcast: U) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable,
        U: Fn(Arc<I>) -> Arc<S> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::trait_implementation::<S, I, U>(lifetime, upcast))
    }

    pub fn add_singleton_trait_type<S, I, U>(&mut self, upcast: U) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable,
        U: Fn(Arc<I>) -> Arc<S> + Send + Sync + 'static,
    {
        self.add_trait_type::<S, I, U>(Lifetime::Singleton, upcast)
    }

    pub fn add_scoped_trait_type<S, I, U>(&mut self, upcast: U) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable,
        U: Fn(Arc<I>) -> Arc<S> + Send + Sync + 'static,
    {
        self.add_trait_type::<S, I, U>(Lifetime::Scoped, upcast)
    }

    pub fn add_transient_trait_type<S, I, U>(&mut self, upcast: U) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable,
        U: Fn(Arc<I>) -> Arc<S> + Send + Sync + 'static,
    {
        self.add_trait_type::<S, I, U>(Lifetime::Transient, upcast)
    }

    // ----- Conditional Registration (TryAdd*) -----

    /// Registers a singleton instance unless `T` is already registered.
    ///
    /// ```rust
    /// use aspect_di::ServiceCollection;
    ///
    /// let mut services = ServiceCollection::new();
    /// assert!(services.try_add_singleton(42usize));
    /// assert!(!services.try_add_singleton(100usize));
    /// ```
    pub fn try_add_singleton<T: Send + Sync + 'static>(&mut self, value: T) -> bool {
        self.try_add(ServiceDescriptor::instance(value))
    }

    pub fn try_add_singleton_factory<T, F>(&mut self, factory: F) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> T + Send + Sync + 'static,
    {
        self.try_add(ServiceDescriptor::factory::<T, F>(Lifetime::Singleton, factory))
    }

    pub fn try_add_scoped_factory<T, F>(&mut self, factory: F) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> T + Send + Sync + 'static,
    {
        self.try_add(ServiceDescriptor::factory::<T, F>(Lifetime::Scoped, factory))
    }

    pub fn try_add_transient_factory<T, F>(&mut self, factory: F) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> T + Send + Sync + 'static,
    {
        self.try_add(ServiceDescriptor::factory::<T, F>(Lifetime::Transient, factory))
    }

    pub fn try_add_type<I: Injectable>(&mut self, lifetime: Lifetime) -> bool {
        self.try_add(ServiceDescriptor::implementation::<I>(lifetime))
    }

    pub fn try_add_singleton_trait<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) -> bool {
        self.try_add(ServiceDescriptor::trait_instance(value))
    }

    pub fn try_add_trait_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> Arc<T> + Send + Sync + 'static,
    {
        self.try_add(ServiceDescriptor::trait_factory::<T, F>(lifetime, factory))
    }

    pub fn try_add_trait_type<S, I, U>(&mut self, lifetime: Lifetime, upcast: U) -> bool
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable,
        U: Fn(Arc<I>) -> Arc<S> + Send + Sync + 'static,
    {
        self.try_add(ServiceDescriptor::trait_implementation::<S, I, U>(lifetime, upcast))
    }

    // ----- Interception -----

    /// Registers the proxy used when an implementation of trait `T` is intercepted.
    ///
    /// The factory receives the raw target and the interceptor chain; the
    /// proxy forwards each method through [`InterceptorChain::invoke`].
    pub fn add_interface_proxy<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>, InterceptorChain) -> Arc<T> + Send + Sync + 'static,
    {
        self.proxies.add_interface::<T, F>(factory);
        self
    }

    /// Registers the proxy used when concrete type `T` is intercepted.
    ///
    /// Without one, `T` is never proxied.
    pub fn add_class_proxy<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>, InterceptorChain) -> T + Send + Sync + 'static,
    {
        self.proxies.add_class::<T, F>(factory);
        self
    }

    /// Uses `registry` instead of the process-wide
    /// [`InterceptionRegistry::global`] for the built provider.
    pub fn with_interception(&mut self, registry: Arc<InterceptionRegistry>) -> &mut Self {
        self.interception = Some(registry);
        self
    }

    // ----- Build -----

    /// Builds a provider with default [`ServiceProviderOptions`].
    ///
    /// ```
    /// use aspect_di::{ServiceCollection, Resolver};
    ///
    /// let mut collection = ServiceCollection::new();
    /// collection.add_singleton(42usize);
    /// collection.add_transient_factory::<String, _>(|_| "Hello".to_string());
    ///
    /// let provider = collection.build();
    /// assert_eq!(*provider.get_required::<usize>(), 42);
    /// assert_eq!(&*provider.get_required::<String>(), "Hello");
    /// ```
    pub fn build(self) -> ServiceProvider {
        self.build_with_options(ServiceProviderOptions::default())
    }

    pub fn build_with_options(self, options: ServiceProviderOptions) -> ServiceProvider {
        let registry = self.interception.unwrap_or_else(InterceptionRegistry::global);
        debug!(proxies = self.proxies.len(), "collection built");
        let interception = Interception::new(registry, self.proxies);
        ServiceProvider::new(self.descriptors, interception, options)
    }
}
