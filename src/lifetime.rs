//! Service lifetime definitions.

/// Service lifetimes controlling instance caching behavior
///
/// # Examples
///
/// ```rust
/// use aspect_di::{ServiceCollection, Resolver};
///
/// struct Database { url: String }
/// struct Repository { db_url: String }
/// struct RequestModel { id: u32 }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() });
/// services.add_scoped_factory::<Repository, _>(|r| {
///     let db = r.get_required::<Database>();
///     Repository { db_url: db.url.clone() }
/// });
/// services.add_transient_factory::<RequestModel, _>(|_| RequestModel { id: 7 });
///
/// let provider = services.build();
///
/// // Singleton: same instance across scopes
/// let scope1 = provider.create_scope();
/// let db1 = provider.get_required::<Database>();
/// let db2 = scope1.get_required::<Database>();
/// assert!(std::sync::Arc::ptr_eq(&db1, &db2));
///
/// // Scoped: same within scope, different across scopes
/// let repo1a = scope1.get_required::<Repository>();
/// let repo1b = scope1.get_required::<Repository>();
/// assert!(std::sync::Arc::ptr_eq(&repo1a, &repo1b));
/// let scope2 = provider.create_scope();
/// let repo2 = scope2.get_required::<Repository>();
/// assert!(!std::sync::Arc::ptr_eq(&repo1a, &repo2));
/// assert_eq!(repo2.db_url, "postgres://localhost");
///
/// // Transient: always different instances
/// let model1 = scope1.get_required::<RequestModel>();
/// let model2 = scope1.get_required::<RequestModel>();
/// assert!(!std::sync::Arc::ptr_eq(&model1, &model2));
/// assert_eq!(model1.id, model2.id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Single instance per provider, cached in the root scope.
    Singleton,
    /// Single instance per scope, cached for the scope's lifetime.
    ///
    /// Resolving a scoped service from the root scope is rejected while scope
    /// validation is enabled.
    Scoped,
    /// New instance per resolution, never cached but still tracked for disposal
    /// by the scope that produced it.
    Transient,
}

impl Lifetime {
    /// Human-readable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifetime::Singleton => "singleton",
            Lifetime::Scoped => "scoped",
            Lifetime::Transient => "transient",
        }
    }
}
