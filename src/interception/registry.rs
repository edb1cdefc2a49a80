//! Allow-list of interceptable implementation names and the interceptor set.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{ReentrantMutex, RwLock};
use regex::{Regex, RegexBuilder};
use tracing::debug;

use super::Interceptor;
use crate::error::{DiError, DiResult};
use crate::provider::ResolverContext;

/// Creates an interceptor, resolving its dependencies from the root scope.
pub type InterceptorFactory =
    Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> Arc<dyn Interceptor> + Send + Sync>;

static GLOBAL: Lazy<Arc<InterceptionRegistry>> = Lazy::new(|| Arc::new(InterceptionRegistry::new()));

/// Interception configuration shared by every provider that uses it.
///
/// Holds the allow-list of implementation-name patterns and the interceptor
/// factories. Interceptors are created from the factories once, at the start
/// of the first outermost resolution that finds both registered, and reused
/// afterwards.
///
/// Providers use [`InterceptionRegistry::global`] unless their collection was
/// given a private registry with
/// [`ServiceCollection::with_interception`](crate::ServiceCollection::with_interception).
pub struct InterceptionRegistry {
    patterns: RwLock<Vec<(String, Regex)>>,
    factories: RwLock<Vec<InterceptorFactory>>,
    materialized: RwLock<Option<Arc<[Arc<dyn Interceptor>]>>>,
    // Held while interceptors are being created; the flag marks same-thread re-entry.
    materializing: ReentrantMutex<Cell<bool>>,
}

impl InterceptionRegistry {
    pub fn new() -> Self {
        Self {
            patterns: RwLock::new(Vec::new()),
            factories: RwLock::new(Vec::new()),
            materialized: RwLock::new(None),
            materializing: ReentrantMutex::new(Cell::new(false)),
        }
    }

    /// The process-wide registry.
    pub fn global() -> Arc<InterceptionRegistry> {
        GLOBAL.clone()
    }

    /// Adds a pattern to the allow-list.
    ///
    /// Patterns are regular expressions matched case-insensitively anywhere in
    /// the implementation name. Registering a pattern that differs from an
    /// existing one only by case is a no-op.
    ///
    /// ```rust
    /// use aspect_di::InterceptionRegistry;
    ///
    /// let registry = InterceptionRegistry::new();
    /// registry.register_name_pattern(r"^billing::").unwrap();
    /// assert!(registry.is_interceptable("Billing::InvoiceService"));
    /// assert!(!registry.is_interceptable("shipping::Tracker"));
    /// assert!(registry.register_name_pattern("(").is_err());
    /// ```
    pub fn register_name_pattern(&self, pattern: &str) -> DiResult<()> {
        let source = pattern.to_lowercase();
        let mut patterns = self.patterns.write();
        if patterns.iter().any(|(existing, _)| *existing == source) {
            return Ok(());
        }
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| DiError::Registration(format!("invalid interceptable name pattern {:?}: {}", pattern, e)))?;
        debug!(pattern = %source, "registered interceptable name pattern");
        patterns.push((source, regex));
        Ok(())
    }

    /// Adds an interceptor factory. Factories run in registration order.
    ///
    /// Factories run once, at the first resolution made after both a pattern
    /// and a factory are registered, and resolve their dependencies from the
    /// root scope. A service a factory resolves is not itself intercepted by
    /// the global interceptors, and when it is a singleton it stays cached
    /// without a proxy.
    pub fn register_interceptor_factory<F>(&self, factory: F)
    where
        F: for<'a> Fn(&ResolverContext<'a>) -> Arc<dyn Interceptor> + Send + Sync + 'static,
    {
        self.factories.write().push(Arc::new(factory));
    }

    /// Adds an already-built interceptor.
    pub fn register_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        self.register_interceptor_factory(move |_: &ResolverContext<'_>| interceptor.clone());
    }

    /// Whether `implementation_name` matches any allow-list pattern.
    /// An empty allow-list matches nothing.
    pub fn is_interceptable(&self, implementation_name: &str) -> bool {
        let patterns = self.patterns.read();
        patterns.iter().any(|(_, regex)| regex.is_match(implementation_name))
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.read().len()
    }

    pub fn factory_count(&self) -> usize {
        self.factories.read().len()
    }

    /// The interceptors created so far, if materialization already happened.
    pub fn materialized(&self) -> Option<Arc<[Arc<dyn Interceptor>]>> {
        self.materialized.read().clone()
    }

    /// Whether interceptors still have to be created for any resolution to
    /// see them: patterns and factories exist but nothing is materialized.
    pub(crate) fn awaits_materialization(&self) -> bool {
        self.materialized.read().is_none() && self.factory_count() > 0 && self.pattern_count() > 0
    }

    /// Creates the interceptors from the registered factories, once.
    ///
    /// Later calls return the set created by the first call. While no factory
    /// is registered nothing is stored, so factories added afterwards are still
    /// picked up. Re-entry from inside a factory on the same thread yields an
    /// empty set.
    pub fn materialize(&self, resolver: &ResolverContext<'_>) -> Arc<[Arc<dyn Interceptor>]> {
        if let Some(set) = self.materialized() {
            return set;
        }

        let gate = self.materializing.lock();
        if let Some(set) = self.materialized() {
            return set;
        }
        if gate.get() {
            debug!("resolution inside an interceptor factory, global interceptors are not applied to it");
            return Arc::from(Vec::new());
        }

        let factories = self.factories.read().clone();
        if factories.is_empty() {
            return Arc::from(Vec::new());
        }

        gate.set(true);
        let _reset = ResetOnDrop(&gate);
        let set: Arc<[Arc<dyn Interceptor>]> = factories.iter().map(|factory| factory(resolver)).collect();
        debug!(interceptors = set.len(), "materialized interceptors");
        *self.materialized.write() = Some(set.clone());
        set
    }

    /// Clears patterns, factories and materialized interceptors.
    pub fn reset(&self) {
        let _gate = self.materializing.lock();
        self.patterns.write().clear();
        self.factories.write().clear();
        *self.materialized.write() = None;
    }
}

struct ResetOnDrop<'a>(&'a Cell<bool>);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Default for InterceptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InterceptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns: Vec<String> = self.patterns.read().iter().map(|(source, _)| source.clone()).collect();
        f.debug_struct("InterceptionRegistry")
            .field("patterns", &patterns)
            .field("factories", &self.factory_count())
            .field("materialized", &self.materialized().map(|set| set.len()))
            .finish()
    }
}
