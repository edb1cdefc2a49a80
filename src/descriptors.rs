//! Service descriptors: the immutable registration records the provider is built from.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::activation::{AnyArc, Injectable, TypeActivator};
use crate::error::DiResult;
use crate::interception::Interceptor;
use crate::key::{key_of_trait, key_of_type, Key};
use crate::lifetime::Lifetime;
use crate::provider::ResolverContext;

/// Erased factory closure shared by every factory registration.
pub(crate) type FactoryFn =
    Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// How a descriptor produces its service.
#[derive(Clone)]
pub(crate) enum Implementation {
    Type(TypeActivator),
    Factory(FactoryFn),
    Instance(AnyArc),
}

/// Public view of a descriptor's implementation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplementationKind {
    /// Activated by the container through [`Injectable`] constructors.
    Type,
    /// Produced by a registered closure.
    Factory,
    /// A fixed, pre-built instance.
    Instance,
}

/// Service descriptor
///
/// Records the service key, lifetime, implementation strategy and the
/// descriptor's own ordered interceptors. Exactly one implementation strategy
/// is set, enforced by construction.
///
/// # Examples
///
/// ```rust
/// use aspect_di::{ImplementationKind, Lifetime, ServiceCollection, ServiceDescriptor};
///
/// struct Database { url: String }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() });
/// services.add(ServiceDescriptor::factory::<u32, _>(Lifetime::Transient, |_| 7));
///
/// let descriptors = services.descriptors();
/// assert_eq!(descriptors.len(), 2);
/// assert_eq!(descriptors[0].lifetime(), Lifetime::Singleton);
/// assert_eq!(descriptors[0].implementation_kind(), ImplementationKind::Instance);
/// assert!(descriptors[0].service_name().contains("Database"));
/// assert_eq!(descriptors[1].implementation_kind(), ImplementationKind::Factory);
/// ```
#[derive(Clone)]
pub struct ServiceDescriptor {
    key: Key,
    lifetime: Lifetime,
    implementation_name: &'static str,
    pub(crate) implementation: Implementation,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ServiceDescriptor {
    fn new(key: Key, lifetime: Lifetime, implementation_name: &'static str, implementation: Implementation) -> Self {
        Self { key, lifetime, implementation_name, implementation, interceptors: Vec::new() }
    }

    /// Fixed singleton instance of a concrete type.
    pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(
            key_of_type::<T>(),
            Lifetime::Singleton,
            type_name::<T>(),
            Implementation::Instance(Arc::new(value)),
        )
    }

    /// Fixed singleton instance of a trait service.
    pub fn trait_instance<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self::new(
            key_of_trait::<T>(),
            Lifetime::Singleton,
            type_name::<T>(),
            Implementation::Instance(Arc::new(value)),
        )
    }

    /// Infallible factory for a concrete type.
    pub fn factory<T, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> T + Send + Sync + 'static,
    {
        Self::try_factory::<T, _>(lifetime, move |r| Ok(factory(r)))
    }

    /// Fallible factory for a concrete type. An `Err` surfaces unchanged to
    /// the caller and nothing is cached.
    pub fn try_factory<T, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        let erased: FactoryFn =
            Arc::new(move |r: &ResolverContext<'_>| factory(r).map(|value| Arc::new(value) as AnyArc));
        Self::new(key_of_type::<T>(), lifetime, type_name::<T>(), Implementation::Factory(erased))
    }

    /// Infallible factory for a trait service.
    pub fn trait_factory<T, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> Arc<T> + Send + Sync + 'static,
    {
        Self::try_trait_factory::<T, _>(lifetime, move |r| Ok(factory(r)))
    }

    /// Fallible factory for a trait service.
    pub fn try_trait_factory<T, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        let erased: FactoryFn =
            Arc::new(move |r: &ResolverContext<'_>| factory(r).map(|value| Arc::new(value) as AnyArc));
        Self::new(key_of_trait::<T>(), lifetime, type_name::<T>(), Implementation::Factory(erased))
    }

    /// Concrete type activated by the container.
    pub fn implementation<I: Injectable>(lifetime: Lifetime) -> Self {
        Self::new(
            key_of_type::<I>(),
            lifetime,
            type_name::<I>(),
            Implementation::Type(TypeActivator::concrete::<I>()),
        )
    }

    /// Trait service implemented by a container-activated type.
    pub fn trait_implementation<S, I, U>(lifetime: Lifetime, upcast: U) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable,
        U: Fn(Arc<I>) -> Arc<S> + Send + Sync + 'static,
    {
        Self::new(
            key_of_trait::<S>(),
            lifetime,
            type_name::<I>(),
            Implementation::Type(TypeActivator::upcast::<S, I, U>(upcast)),
        )
    }

    /// Appends descriptor-level interceptors, run after the global ones.
    pub fn with_interceptors<I>(mut self, interceptors: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Interceptor>>,
    {
        self.interceptors.extend(interceptors);
        self
    }

    pub fn with_interceptor(self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.with_interceptors(std::iter::once(interceptor))
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Type or trait name of the service.
    pub fn service_name(&self) -> &'static str {
        self.key.display_name()
    }

    /// Name matched against the interception allow-list.
    ///
    /// The implementation type for type registrations, the produced type for
    /// concrete factories and instances, and the service name for trait
    /// factories and instances.
    pub fn implementation_name(&self) -> &'static str {
        self.implementation_name
    }

    pub fn implementation_kind(&self) -> ImplementationKind {
        match self.implementation {
            Implementation::Type(_) => ImplementationKind::Type,
            Implementation::Factory(_) => ImplementationKind::Factory,
            Implementation::Instance(_) => ImplementationKind::Instance,
        }
    }

    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("service", &self.key.display_name())
            .field("lifetime", &self.lifetime)
            .field("implementation", &self.implementation_name)
            .field("kind", &self.implementation_kind())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
