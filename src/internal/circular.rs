//! Runtime re-entrancy detection.
//!
//! The call-site builder rejects cycles between registrations it can see.
//! Factories resolve their dependencies at production time, invisible to the
//! builder, so each thread also tracks the requests it is currently resolving.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};
use crate::key::ServiceRequest;

pub(crate) const MAX_DEPTH: usize = 1024;

thread_local! {
    static RESOLVING: RefCell<Vec<ServiceRequest>> = const { RefCell::new(Vec::new()) };
}

/// Number of requests this thread is currently resolving.
pub(crate) fn resolution_depth() -> usize {
    RESOLVING.with(|stack| stack.borrow().len())
}

/// Marks a request as being resolved on this thread until dropped.
pub(crate) struct ResolutionGuard {
    request: ServiceRequest,
}

impl ResolutionGuard {
    pub(crate) fn enter(request: ServiceRequest) -> DiResult<Self> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();

            // Circular detection before pushing
            if stack.contains(&request) {
                let mut path: Vec<&'static str> = stack.iter().map(|r| r.key().display_name()).collect();
                path.push(request.key().display_name());
                return Err(DiError::Circular(path));
            }

            if stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(stack.len()));
            }

            stack.push(request);
            Ok(())
        })?;

        Ok(Self { request })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            if let Some(last) = stack.borrow_mut().pop() {
                debug_assert_eq!(last, self.request);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::key_of_type;

    #[test]
    fn nested_distinct_requests_are_allowed() {
        let a = ResolutionGuard::enter(ServiceRequest::Single(key_of_type::<u8>())).unwrap();
        let b = ResolutionGuard::enter(ServiceRequest::All(key_of_type::<u8>())).unwrap();
        drop(b);
        drop(a);
    }

    #[test]
    fn reentry_reports_the_path() {
        let outer = ServiceRequest::Single(key_of_type::<u8>());
        let inner = ServiceRequest::Single(key_of_type::<u16>());
        let _a = ResolutionGuard::enter(outer).unwrap();
        let _b = ResolutionGuard::enter(inner).unwrap();
        match ResolutionGuard::enter(outer) {
            Err(DiError::Circular(path)) => assert_eq!(path, vec!["u8", "u16", "u8"]),
            _ => panic!("expected a circular error"),
        }
    }

    #[test]
    fn guard_pops_on_drop() {
        let request = ServiceRequest::Single(key_of_type::<u32>());
        drop(ResolutionGuard::enter(request).unwrap());
        assert_eq!(resolution_depth(), 0);
        let _again = ResolutionGuard::enter(request).unwrap();
        assert_eq!(resolution_depth(), 1);
    }
}
