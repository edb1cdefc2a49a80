//! # aspect-di
//!
//! Call-site based dependency injection with scoped lifetimes, interchangeable
//! resolution engines and interceptor proxies, in the spirit of
//! Microsoft.Extensions.DependencyInjection.
//!
//! ## Features
//!
//! - **Lifetimes**: Singleton, Scoped and Transient services with per-scope disposal
//! - **Constructor injection**: implementation types declare constructors; the
//!   container picks the richest one it can satisfy
//! - **Enumerable services**: every registration of a service, in registration order
//! - **Build-time checks**: cycles, missing dependencies and scoped services
//!   captured by singletons are rejected before anything is produced
//! - **Resolution engines**: interpreted, compiled, or interpreted-then-compiled
//! - **Interception**: allow-listed implementations are wrapped in proxies that
//!   route calls through an interceptor chain
//!
//! ## Quick Start
//!
//! ```rust
//! use aspect_di::{ServiceCollection, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! services.add_transient_factory::<UserService, _>(|resolver| {
//!     UserService {
//!         db: resolver.get_required::<Database>(),
//!     }
//! });
//!
//! let provider = services.build();
//! let user_service = provider.get_required::<UserService>();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: Created once, in the root scope, and shared by every scope
//! - **Scoped**: Created once per scope (ideal for request contexts)
//! - **Transient**: Created fresh on every resolution
//!
//! With scope validation on (the default) a singleton may not depend on a
//! scoped service, and scoped services may not be resolved from the root:
//!
//! ```rust
//! use aspect_di::{DiError, ServiceCollection, Resolver};
//!
//! struct Session;
//!
//! let mut services = ServiceCollection::new();
//! services.add_scoped_factory::<Session, _>(|_| Session);
//!
//! let provider = services.build();
//! assert!(matches!(provider.get::<Session>(), Err(DiError::ScopedFromRoot { .. })));
//! assert!(provider.create_scope().get::<Session>().is_ok());
//! ```
//!
//! ## Constructor Injection
//!
//! ```rust
//! use aspect_di::{Constructor, Injectable, ServiceCollection, Resolver};
//! use std::sync::Arc;
//!
//! struct Clock;
//! struct Scheduler { clock: Arc<Clock> }
//!
//! impl Injectable for Scheduler {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new(|args| Ok(Scheduler { clock: args.next()? })).param::<Clock>()]
//!     }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton(Clock);
//! services.add_singleton_type::<Scheduler>();
//!
//! let provider = services.build();
//! let scheduler = provider.get_required::<Scheduler>();
//! assert!(Arc::ptr_eq(&scheduler.clock, &provider.get_required::<Clock>()));
//! ```
//!
//! ## Resolution Engines
//!
//! ```rust
//! use aspect_di::{ServiceCollection, ServiceProviderMode, ServiceProviderOptions, Resolver};
//!
//! let mut services = ServiceCollection::new();
//! services.add_transient_factory::<String, _>(|_| "same graph".to_string());
//!
//! let options = ServiceProviderOptions::default().with_mode(ServiceProviderMode::Runtime);
//! let provider = services.build_with_options(options);
//! assert_eq!(&*provider.get_required::<String>(), "same graph");
//! ```

// Module declarations
pub mod activation;
pub mod call_site;
pub mod collection;
pub mod descriptors;
pub mod engine;
pub mod error;
pub mod interception;
pub mod key;
pub mod lifetime;
pub mod provider;
pub mod traits;

// Internal modules
mod internal;

// Re-export core types
pub use activation::{Arguments, Constructor, Injectable, Parameter, ParameterKind};
pub use call_site::{CallSite, CallSiteType};
pub use collection::ServiceCollection;
pub use descriptors::{ImplementationKind, ServiceDescriptor};
pub use engine::ServiceProviderMode;
pub use error::{BoxError, DiError, DiResult, DisposeError};
pub use interception::{
    InterceptionRegistry, Interceptor, InterceptorChain, InterceptorFactory, Invocation, InvocationError,
    ProxyError,
};
pub use key::{key_of_trait, key_of_type, CacheKey, Key, ServiceRequest};
pub use lifetime::Lifetime;
pub use provider::{ResolverContext, Scope, ScopeFactory, ServiceProvider, ServiceProviderOptions};
pub use traits::{Dispose, Resolver, ResolverCore};
