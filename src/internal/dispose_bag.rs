//! Internal disposal bag for captured disposables.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use crate::error::{BoxError, DisposeError};
use crate::traits::Dispose;

/// Disposables in capture order, disposed last-captured first.
#[derive(Default)]
pub(crate) struct DisposeBag {
    entries: Vec<Arc<dyn Dispose>>,
}

impl DisposeBag {
    pub(crate) fn push(&mut self, disposable: Arc<dyn Dispose>) {
        self.entries.push(disposable);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Empties the bag, handing its entries out in capture order.
    pub(crate) fn take(&mut self) -> Vec<Arc<dyn Dispose>> {
        std::mem::take(&mut self.entries)
    }
}

/// Disposes `entries` in reverse order, attempting every one.
///
/// Errors and panics are collected and returned together.
pub(crate) fn dispose_all_reverse(entries: Vec<Arc<dyn Dispose>>) -> Result<(), DisposeError> {
    let mut failures: Vec<BoxError> = Vec::new();
    for disposable in entries.into_iter().rev() {
        match catch_unwind(AssertUnwindSafe(|| disposable.dispose())) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(%error, "disposable failed");
                failures.push(error);
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "disposable panicked".to_string());
                warn!(%message, "disposable panicked");
                failures.push(message.into());
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(DisposeError { failures })
    }
}
