//! Interception of calls made on resolved services.
//!
//! A service whose implementation name matches the interception allow-list is
//! handed to a registered proxy factory together with an [`InterceptorChain`].
//! The proxy implements the service's surface and routes each method through
//! [`InterceptorChain::invoke`], which runs the interceptors in order before
//! reaching the real target.
//!
//! # Examples
//!
//! ```rust
//! use aspect_di::{
//!     InterceptionRegistry, Interceptor, InterceptorChain, Invocation, Resolver,
//!     ServiceCollection,
//! };
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! pub trait Greeter: Send + Sync {
//!     fn greet(&self, name: &str) -> String;
//! }
//!
//! pub struct EnglishGreeter;
//! impl Greeter for EnglishGreeter {
//!     fn greet(&self, name: &str) -> String { format!("Hello, {}", name) }
//! }
//!
//! struct GreeterProxy { target: Arc<dyn Greeter>, chain: InterceptorChain }
//! impl Greeter for GreeterProxy {
//!     fn greet(&self, name: &str) -> String {
//!         self.chain
//!             .invoke("greet", &[&name], || self.target.greet(name))
//!             .unwrap_or_default()
//!     }
//! }
//!
//! struct Counting(AtomicUsize);
//! impl Interceptor for Counting {
//!     fn intercept(&self, invocation: &mut Invocation<'_>) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         invocation.proceed();
//!     }
//! }
//!
//! let counting = Arc::new(Counting(AtomicUsize::new(0)));
//! let registry = Arc::new(InterceptionRegistry::new());
//! registry.register_name_pattern("greeter").unwrap();
//! registry.register_interceptor(counting.clone());
//!
//! let mut services = ServiceCollection::new();
//! services.with_interception(registry);
//! services.add_interface_proxy::<dyn Greeter, _>(|target, chain| {
//!     Arc::new(GreeterProxy { target, chain })
//! });
//! services.add_singleton_trait_factory::<dyn Greeter, _>(|_| Arc::new(EnglishGreeter));
//!
//! let provider = services.build();
//! let greeter = provider.get_required_trait::<dyn Greeter>();
//! assert_eq!(greeter.greet("Ada"), "Hello, Ada");
//! assert_eq!(counting.0.load(Ordering::SeqCst), 1);
//! ```

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

mod proxy;
mod registry;

pub use proxy::ProxyError;
pub(crate) use proxy::{Interception, ProxyRegistry};
pub use registry::{InterceptionRegistry, InterceptorFactory};

/// Cross-cutting behavior run around a proxied method call.
///
/// An interceptor continues the chain by calling [`Invocation::proceed`]. It
/// may run code before and after it, replace the return value, or skip
/// `proceed` entirely and supply its own return value.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, invocation: &mut Invocation<'_>);
}

/// A method call travelling through an interceptor chain.
pub struct Invocation<'a> {
    method: &'static str,
    service_type: &'static str,
    implementation_type: &'static str,
    arguments: &'a [&'a dyn fmt::Debug],
    return_value: Option<Box<dyn Any + Send>>,
    pending: &'a [Arc<dyn Interceptor>],
    target: &'a mut dyn FnMut() -> Box<dyn Any + Send>,
}

impl<'a> Invocation<'a> {
    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn service_type(&self) -> &'static str {
        self.service_type
    }

    pub fn implementation_type(&self) -> &'static str {
        self.implementation_type
    }

    pub fn arguments(&self) -> &[&'a dyn fmt::Debug] {
        self.arguments
    }

    /// Runs the next interceptor, or the target once the chain is exhausted.
    pub fn proceed(&mut self) {
        let pending = self.pending;
        match pending.split_first() {
            Some((next, rest)) => {
                self.pending = rest;
                next.intercept(self);
                self.pending = pending;
            }
            None => {
                self.return_value = Some((self.target)());
            }
        }
    }

    pub fn has_return_value(&self) -> bool {
        self.return_value.is_some()
    }

    /// The current return value, if it has type `R`.
    pub fn return_value<R: Any>(&self) -> Option<&R> {
        self.return_value.as_ref()?.downcast_ref::<R>()
    }

    pub fn return_value_mut<R: Any>(&mut self) -> Option<&mut R> {
        self.return_value.as_mut()?.downcast_mut::<R>()
    }

    /// Sets or replaces the return value.
    pub fn set_return_value<R: Any + Send>(&mut self, value: R) {
        self.return_value = Some(Box::new(value));
    }

    pub fn take_return_value<R: Any>(&mut self) -> Option<R> {
        let boxed = self.return_value.take()?;
        match boxed.downcast::<R>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.return_value = Some(other);
                None
            }
        }
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("method", &self.method)
            .field("service_type", &self.service_type)
            .field("implementation_type", &self.implementation_type)
            .field("arguments", &self.arguments)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Failure of an intercepted call to yield a return value of the expected type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("interceptor chain for {0} completed without a return value")]
    NoReturnValue(&'static str),
    #[error("interceptor chain for {method} returned a value that is not {expected}")]
    ReturnTypeMismatch {
        method: &'static str,
        expected: &'static str,
    },
}

/// Ordered interceptors applied to one proxied instance.
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    service_type: &'static str,
    implementation_type: &'static str,
}

impl InterceptorChain {
    pub fn new(
        interceptors: Vec<Arc<dyn Interceptor>>,
        service_type: &'static str,
        implementation_type: &'static str,
    ) -> Self {
        Self { interceptors: interceptors.into(), service_type, implementation_type }
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn service_type(&self) -> &'static str {
        self.service_type
    }

    pub fn implementation_type(&self) -> &'static str {
        self.implementation_type
    }

    /// Routes one method call through the chain.
    ///
    /// `target` performs the real call on the proxied instance; it runs only
    /// if every interceptor proceeds. Fallible methods should use a `Result`
    /// as `R` so interceptors can observe and translate errors.
    pub fn invoke<R, F>(
        &self,
        method: &'static str,
        arguments: &[&dyn fmt::Debug],
        mut target: F,
    ) -> Result<R, InvocationError>
    where
        R: Any + Send,
        F: FnMut() -> R,
    {
        let mut erased = || Box::new(target()) as Box<dyn Any + Send>;
        let mut invocation = Invocation {
            method,
            service_type: self.service_type,
            implementation_type: self.implementation_type,
            arguments,
            return_value: None,
            pending: &self.interceptors,
            target: &mut erased,
        };
        invocation.proceed();

        let value = invocation.return_value.take().ok_or(InvocationError::NoReturnValue(method))?;
        value
            .downcast::<R>()
            .map(|boxed| *boxed)
            .map_err(|_| InvocationError::ReturnTypeMismatch { method, expected: type_name::<R>() })
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.interceptors.len())
            .field("service_type", &self.service_type)
            .field("implementation_type", &self.implementation_type)
            .finish()
    }
}
