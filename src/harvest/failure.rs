//! First-error-wins slot shared by every stage of a request.

use crate::error::PipelineError;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

/// Holds the first [`PipelineError`] reported for a request.
///
/// Recording the first failure also cancels the request token, so sibling
/// stages stop issuing remote calls and drop the ones in flight. Later
/// failures are logged and discarded.
#[derive(Debug)]
pub struct FirstFailure {
    slot: OnceLock<Arc<PipelineError>>,
    cancel: CancellationToken,
}

impl FirstFailure {
    /// Create an empty slot that cancels `cancel` on the first record.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            slot: OnceLock::new(),
            cancel,
        }
    }

    /// Record a failure. Returns `true` if this was the first one.
    pub fn record(&self, error: PipelineError) -> bool {
        let error = Arc::new(error);
        let first = self.slot.set(Arc::clone(&error)).is_ok();
        if first {
            tracing::warn!(stage = %error.stage, error = %error, "Harvest stage failed, cancelling request");
            self.cancel.cancel();
        } else {
            tracing::debug!(stage = %error.stage, error = %error, "Discarding failure after the first");
        }
        first
    }

    /// The first recorded failure, if any.
    pub fn first(&self) -> Option<Arc<PipelineError>> {
        self.slot.get().cloned()
    }

    /// Whether any failure has been recorded.
    pub fn is_set(&self) -> bool {
        self.slot.get().is_some()
    }
}
