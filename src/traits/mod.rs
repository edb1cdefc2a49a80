//! Core traits for resolution and disposal.

pub mod dispose;
pub mod resolver;

pub use dispose::Dispose;
pub use resolver::{Resolver, ResolverCore};
