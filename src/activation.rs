//! Constructor model used to activate implementation types.
//!
//! Rust has no runtime constructor reflection, so an implementation type
//! describes how it can be built by implementing [`Injectable`]: an ordered
//! list of [`Constructor`]s, each declaring the services it needs and an
//! activation closure reading them back positionally from [`Arguments`].

use std::any::{type_name, Any};
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{key_of_trait, key_of_type, Key, ServiceRequest};
use crate::provider::{Scope, ScopeFactory};
use crate::traits::Dispose;

/// Type-erased service instance as stored in caches.
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// How a constructor parameter is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// The last registration of the service.
    Single,
    /// Every registration of the service, in registration order.
    All,
}

/// A declared constructor parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter {
    pub key: Key,
    pub kind: ParameterKind,
}

impl Parameter {
    pub(crate) fn request(&self) -> ServiceRequest {
        match self.kind {
            ParameterKind::Single => ServiceRequest::Single(self.key),
            ParameterKind::All => ServiceRequest::All(self.key),
        }
    }
}

/// Resolved constructor arguments, consumed in declaration order.
///
/// Each `next*` call must match the kind of the parameter at the same position
/// in the constructor's declaration.
pub struct Arguments {
    values: std::vec::IntoIter<AnyArc>,
    position: usize,
}

impl Arguments {
    pub(crate) fn new(values: Vec<AnyArc>) -> Self {
        Self { values: values.into_iter(), position: 0 }
    }

    pub(crate) fn empty() -> Self {
        Self::new(Vec::new())
    }

    fn pull(&mut self, expected: &'static str) -> DiResult<AnyArc> {
        self.position += 1;
        self.values.next().ok_or(DiError::NotFound(expected))
    }

    /// Next argument as a concrete service.
    pub fn next<T: Send + Sync + 'static>(&mut self) -> DiResult<Arc<T>> {
        let value = self.pull(type_name::<T>())?;
        downcast_service::<T>(value)
    }

    /// Next argument as a trait service.
    pub fn next_trait<T: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Arc<T>> {
        let value = self.pull(type_name::<T>())?;
        downcast_trait::<T>(value)
    }

    /// Next argument as every registration of a concrete service.
    pub fn next_all<T: Send + Sync + 'static>(&mut self) -> DiResult<Vec<Arc<T>>> {
        let value = self.pull(type_name::<T>())?;
        downcast_list(value)?.into_iter().map(downcast_service::<T>).collect()
    }

    /// Next argument as every registration of a trait service.
    pub fn next_all_trait<T: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Vec<Arc<T>>> {
        let value = self.pull(type_name::<T>())?;
        downcast_list(value)?.into_iter().map(downcast_trait::<T>).collect()
    }

    /// Number of arguments already consumed.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of arguments left.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

/// One way of building `T` from resolved services.
///
/// # Examples
///
/// ```rust
/// use aspect_di::{Constructor, Injectable, ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Settings { url: &'static str }
/// struct Cache;
/// struct Repository { settings: Arc<Settings>, cache: Option<Arc<Cache>> }
///
/// impl Injectable for Repository {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![
///             Constructor::new(|args| Ok(Repository { settings: args.next()?, cache: None }))
///                 .param::<Settings>(),
///             Constructor::new(|args| {
///                 Ok(Repository { settings: args.next()?, cache: Some(args.next()?) })
///             })
///             .param::<Settings>()
///             .param::<Cache>(),
///         ]
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Settings { url: "postgres://localhost" });
/// services.add_transient_type::<Repository>();
///
/// // `Cache` is not registered, so only the one-parameter constructor is usable.
/// let repo = services.build().get_required::<Repository>();
/// assert_eq!(repo.settings.url, "postgres://localhost");
/// assert!(repo.cache.is_none());
/// ```
pub struct Constructor<T> {
    parameters: Vec<Parameter>,
    activate: Arc<dyn Fn(&mut Arguments) -> DiResult<T> + Send + Sync>,
}

impl<T: Send + Sync + 'static> Constructor<T> {
    pub fn new<F>(activate: F) -> Self
    where
        F: Fn(&mut Arguments) -> DiResult<T> + Send + Sync + 'static,
    {
        Self { parameters: Vec::new(), activate: Arc::new(activate) }
    }

    fn with(mut self, key: Key, kind: ParameterKind) -> Self {
        self.parameters.push(Parameter { key, kind });
        self
    }

    /// Declares a concrete service parameter.
    pub fn param<P: Send + Sync + 'static>(self) -> Self {
        self.with(key_of_type::<P>(), ParameterKind::Single)
    }

    /// Declares a trait service parameter, e.g. `param_trait::<dyn Logger>()`.
    pub fn param_trait<P: ?Sized + Send + Sync + 'static>(self) -> Self {
        self.with(key_of_trait::<P>(), ParameterKind::Single)
    }

    /// Declares a parameter receiving every registration of a concrete service.
    pub fn param_all<P: Send + Sync + 'static>(self) -> Self {
        self.with(key_of_type::<P>(), ParameterKind::All)
    }

    /// Declares a parameter receiving every registration of a trait service.
    pub fn param_all_trait<P: ?Sized + Send + Sync + 'static>(self) -> Self {
        self.with(key_of_trait::<P>(), ParameterKind::All)
    }

    /// Declares a parameter receiving the resolving [`Scope`].
    pub fn param_resolver(self) -> Self {
        self.param::<Scope>()
    }

    /// Declares a parameter receiving the [`ScopeFactory`].
    pub fn param_scope_factory(self) -> Self {
        self.param::<ScopeFactory>()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }
}

/// An implementation type the container can activate itself.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Constructors in declaration order. The usable constructor with the most
    /// parameters wins; ties go to the one declared first.
    fn constructors() -> Vec<Constructor<Self>> {
        Vec::new()
    }

    /// Activation used when no declared constructor is usable.
    fn default_activation() -> Option<fn() -> DiResult<Self>> {
        None
    }

    /// Reports the disposable view of a freshly activated instance, if any.
    /// The returned disposable is captured by the scope that owns the instance.
    fn disposer(_instance: &Arc<Self>) -> Option<Arc<dyn Dispose>> {
        None
    }
}

/// A freshly produced value plus what its owning scope must dispose.
pub(crate) struct Produced {
    pub(crate) value: AnyArc,
    pub(crate) disposable: Option<Arc<dyn Dispose>>,
}

impl Produced {
    pub(crate) fn plain(value: AnyArc) -> Self {
        Self { value, disposable: None }
    }
}

pub(crate) type ActivateFn = Arc<dyn Fn(Arguments) -> DiResult<Produced> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct ConstructorInfo {
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) activate: ActivateFn,
}

/// Erased activation recipe of an [`Injectable`] type registered under a
/// concrete or trait key.
#[derive(Clone)]
pub(crate) struct TypeActivator {
    pub(crate) implementation: &'static str,
    pub(crate) constructors: Arc<[ConstructorInfo]>,
    pub(crate) default_activation: Option<ActivateFn>,
}

impl TypeActivator {
    /// Activator storing instances as `Arc<I>`.
    pub(crate) fn concrete<I: Injectable>() -> Self {
        Self::build::<I>(Arc::new(|instance: Arc<I>| instance as AnyArc))
    }

    /// Activator storing instances as `Arc<Arc<S>>` for a trait service `S`.
    pub(crate) fn upcast<S, I, U>(upcast: U) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable,
        U: Fn(Arc<I>) -> Arc<S> + Send + Sync + 'static,
    {
        Self::build::<I>(Arc::new(move |instance: Arc<I>| Arc::new(upcast(instance)) as AnyArc))
    }

    fn build<I: Injectable>(wrap: Arc<dyn Fn(Arc<I>) -> AnyArc + Send + Sync>) -> Self {
        let finish = move |instance: I, wrap: &Arc<dyn Fn(Arc<I>) -> AnyArc + Send + Sync>| {
            let instance = Arc::new(instance);
            let disposable = I::disposer(&instance);
            Produced { value: wrap(instance), disposable }
        };

        let constructors = I::constructors()
            .into_iter()
            .map(|ctor| {
                let wrap = wrap.clone();
                let activate = ctor.activate;
                ConstructorInfo {
                    parameters: ctor.parameters,
                    activate: Arc::new(move |mut args: Arguments| -> DiResult<Produced> {
                        let instance = activate(&mut args)?;
                        Ok(finish(instance, &wrap))
                    }),
                }
            })
            .collect::<Vec<_>>();

        let default_activation = I::default_activation().map(|default| {
            Arc::new(move |_args: Arguments| -> DiResult<Produced> {
                Ok(finish(default()?, &wrap))
            }) as ActivateFn
        });

        Self {
            implementation: type_name::<I>(),
            constructors: constructors.into(),
            default_activation,
        }
    }
}

pub(crate) fn downcast_service<T: Send + Sync + 'static>(value: AnyArc) -> DiResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| DiError::TypeMismatch(type_name::<T>()))
}

pub(crate) fn downcast_trait<T: ?Sized + Send + Sync + 'static>(value: AnyArc) -> DiResult<Arc<T>> {
    // Trait services are stored as Arc<Arc<dyn Trait>>
    value
        .downcast::<Arc<T>>()
        .map(|boxed| (*boxed).clone())
        .map_err(|_| DiError::TypeMismatch(type_name::<T>()))
}

pub(crate) fn downcast_list(value: AnyArc) -> DiResult<Vec<AnyArc>> {
    value
        .downcast::<Vec<AnyArc>>()
        .map(|list| (*list).clone())
        .map_err(|_| DiError::TypeMismatch("enumerable"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf;
    struct Node {
        leaf: Arc<Leaf>,
    }

    impl Injectable for Node {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|args| Ok(Node { leaf: args.next()? })).param::<Leaf>()]
        }
    }

    #[test]
    fn activator_keeps_declared_parameters() {
        let activator = TypeActivator::concrete::<Node>();
        assert_eq!(activator.constructors.len(), 1);
        assert_eq!(activator.constructors[0].parameters[0].key, key_of_type::<Leaf>());
        assert!(activator.default_activation.is_none());
    }

    #[test]
    fn activation_reads_arguments_positionally() {
        let activator = TypeActivator::concrete::<Node>();
        let leaf: AnyArc = Arc::new(Leaf);
        let produced = (activator.constructors[0].activate)(Arguments::new(vec![leaf.clone()])).unwrap();
        let node = produced.value.downcast::<Node>().unwrap();
        let leaf = leaf.downcast::<Leaf>().unwrap();
        assert!(Arc::ptr_eq(&node.leaf, &leaf));
        assert!(produced.disposable.is_none());
    }

    #[test]
    fn wrong_argument_type_is_a_mismatch() {
        let mut args = Arguments::new(vec![Arc::new(5u8) as AnyArc]);
        assert!(matches!(args.next::<u16>(), Err(DiError::TypeMismatch(_))));
        assert!(matches!(args.next::<u8>(), Err(DiError::NotFound(_))));
        assert_eq!(args.position(), 2);
    }
}
