//! Internal implementation details for aspect-di.

pub(crate) mod circular;
pub(crate) mod dispose_bag;

pub(crate) use circular::{resolution_depth, ResolutionGuard};
pub(crate) use dispose_bag::{dispose_all_reverse, DisposeBag};
