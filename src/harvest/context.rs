//! Per-request harvest context, the generic fan-out driver, and stage statistics.

use crate::config::HarvestConfig;
use crate::error::PipelineError;
use crate::types::Stage;
use futures::stream::StreamExt;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::failure::FirstFailure;

/// Length of the random per-request token used in logs and archive names.
const REQUEST_TOKEN_LEN: usize = 12;

/// Shared context for a single harvest request, reducing parameter passing between stages.
///
/// Cloning is cheap: the failure slot is shared and the token clone observes
/// the same cancellation.
#[derive(Clone, Debug)]
pub struct HarvestContext {
    /// Random token identifying this request
    pub request_id: String,
    /// Request-wide cancellation, fired by the first failure or a dropped request
    pub cancel: CancellationToken,
    /// First-error-wins slot
    pub failures: Arc<FirstFailure>,
    /// Remote calls allowed in flight per fan-out stage
    pub concurrency: usize,
    /// Capacity of each inter-stage channel
    pub channel_capacity: usize,
}

impl HarvestContext {
    /// Create a fresh context with a new request token.
    pub fn new(config: &HarvestConfig) -> Self {
        let cancel = CancellationToken::new();
        Self {
            request_id: request_token(),
            failures: Arc::new(FirstFailure::new(cancel.clone())),
            cancel,
            concurrency: config.max_concurrent_requests.max(1),
            channel_capacity: config.channel_capacity.max(1),
        }
    }
}

fn request_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REQUEST_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Counters reported by a fan-out stage when it finishes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageStats {
    /// Inputs whose work completed successfully
    pub succeeded: usize,
    /// Inputs whose work failed
    pub failed: usize,
    /// Items pushed onto the output channel
    pub emitted: usize,
    /// Whether the stage stopped because the request was cancelled
    pub cancelled: bool,
}

/// Drive `work` over every item of `input` with at most `ctx.concurrency` in flight.
///
/// Each work future pushes its own outputs and returns how many it emitted.
/// A failure is recorded into the request's failure slot; the loop then sees
/// the cancelled token and drops every in-flight future. Returns once the
/// input is exhausted and all work has settled, or on cancellation.
pub(crate) async fn drive_fan_out<T, F, Fut>(
    ctx: &HarvestContext,
    stage: Stage,
    input: mpsc::Receiver<T>,
    work: F,
) -> StageStats
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<usize, PipelineError>>,
{
    let mut stats = StageStats::default();
    let mut in_flight = ReceiverStream::new(input)
        .map(work)
        .buffer_unordered(ctx.concurrency);

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                stats.cancelled = true;
                break;
            }
            next = in_flight.next() => next,
        };

        match next {
            Some(Ok(emitted)) => {
                stats.succeeded += 1;
                stats.emitted += emitted;
            }
            Some(Err(e)) => {
                stats.failed += 1;
                ctx.failures.record(e);
            }
            None => break,
        }
    }

    tracing::debug!(
        request_id = %ctx.request_id,
        stage = %stage,
        succeeded = stats.succeeded,
        failed = stats.failed,
        emitted = stats.emitted,
        cancelled = stats.cancelled,
        "Harvest stage finished"
    );
    stats
}
