//! Service key types for the dependency injection container.

use std::any::{type_name, TypeId};
use std::hash::{Hash, Hasher};

/// Key for service storage and lookup.
///
/// A service is identified either by a concrete type or by a trait object
/// type such as `dyn Logger`. Both carry the `TypeId` used for lookups and the
/// type name used in diagnostics.
///
/// # Examples
///
/// ```rust
/// use aspect_di::{key_of_trait, key_of_type, Key};
///
/// trait Logger: Send + Sync {}
///
/// let number = key_of_type::<u32>();
/// assert_eq!(number.display_name(), "u32");
/// assert!(!number.is_trait());
///
/// let logger = key_of_trait::<dyn Logger>();
/// assert!(logger.is_trait());
/// assert!(logger.display_name().contains("Logger"));
/// assert_ne!(number, logger);
/// ```
#[derive(Debug, Clone, Copy)]
pub enum Key {
    /// Concrete type key with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Trait object key (`dyn Trait`) with TypeId and name for diagnostics
    Trait(TypeId, &'static str),
}

impl Key {
    /// Get the type or trait name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) | Key::Trait(_, name) => name,
        }
    }

    pub fn type_id(&self) -> TypeId {
        match self {
            Key::Type(id, _) | Key::Trait(id, _) => *id,
        }
    }

    pub fn is_trait(&self) -> bool {
        matches!(self, Key::Trait(..))
    }
}

// TypeId-only comparison; the name is diagnostic
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::Trait(a, _), Key::Trait(b, _)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.is_trait().hash(state);
        self.type_id().hash(state);
    }
}

/// Key for a concrete service type.
#[inline]
pub fn key_of_type<T: 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), type_name::<T>())
}

/// Key for a trait object service type, e.g. `key_of_trait::<dyn Logger>()`.
#[inline]
pub fn key_of_trait<T: ?Sized + 'static>() -> Key {
    Key::Trait(TypeId::of::<T>(), type_name::<T>())
}

/// A service request: a single instance, or every registration of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceRequest {
    /// Resolves the last registration of the key.
    Single(Key),
    /// Resolves all registrations of the key, in registration order.
    All(Key),
}

impl ServiceRequest {
    pub fn key(&self) -> Key {
        match self {
            ServiceRequest::Single(key) | ServiceRequest::All(key) => *key,
        }
    }
}

/// Identity of a cached scoped or singleton instance.
///
/// `slot` counts registrations of `key` backwards from the last one, so the
/// last registration has slot 0 whether it is resolved on its own or as part
/// of an enumerable request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub key: Key,
    pub slot: usize,
}
