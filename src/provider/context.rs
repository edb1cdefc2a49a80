//! Resolver context for dependency injection.
//!
//! This module contains the ResolverContext type which provides
//! the interface for factory functions to resolve dependencies.

use std::sync::Arc;

use crate::activation::AnyArc;
use crate::error::DiResult;
use crate::key::Key;
use crate::traits::{Dispose, Resolver, ResolverCore};

use super::Scope;

/// Context passed to factory functions for resolving dependencies.
///
/// A factory always runs against the scope that owns what it produces: the
/// root scope for singletons, the resolving scope otherwise. Disposables
/// registered through the context are captured by that scope.
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
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database {
///     url: "postgres://localhost".to_string()
/// });
/// services.add_transient_factory::<UserService, _>(|resolver| {
///     // resolver is a ResolverContext that provides access to other services
///     UserService {
///         db: resolver.get_required::<Database>(),
///     }
/// });
///
/// let users = services.build().get_required::<UserService>();
/// assert_eq!(users.db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    scope: &'a Scope,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(scope: &'a Scope) -> Self {
        Self { scope }
    }

    /// The scope the factory is producing for.
    pub fn scope(&self) -> &'a Scope {
        self.scope
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn try_resolve_any(&self, key: &Key) -> DiResult<Option<AnyArc>> {
        self.scope.try_resolve_any(key)
    }

    fn resolve_many(&self, key: &Key) -> DiResult<Vec<AnyArc>> {
        self.scope.resolve_many(key)
    }

    fn capture_disposable(&self, disposable: Arc<dyn Dispose>) {
        self.scope.capture_disposable(disposable);
    }
}

impl Resolver for ResolverContext<'_> {}
