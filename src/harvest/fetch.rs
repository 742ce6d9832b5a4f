//! Content fetching: one get-message call per enumerated identifier.

use crate::error::PipelineError;
use crate::mail::MailClient;
use crate::types::{Message, MessageId, Stage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::context::{HarvestContext, StageStats, drive_fan_out};

pub(crate) const CONTENT_LABEL: &str = "Unable to retrieve Message Contents";

/// Spawn the content fetcher over `ids`.
///
/// The returned channel closes once every call has completed or the request
/// is cancelled; the handle resolves to the stage's counters.
pub fn spawn_content_fetcher(
    ctx: &HarvestContext,
    client: Arc<dyn MailClient>,
    ids: mpsc::Receiver<MessageId>,
) -> (mpsc::Receiver<Message>, JoinHandle<StageStats>) {
    let (tx, rx) = mpsc::channel(ctx.channel_capacity);
    let ctx = ctx.clone();

    let handle = tokio::spawn(async move {
        drive_fan_out(&ctx, Stage::FetchContent, ids, |id| {
            let client = Arc::clone(&client);
            let tx = tx.clone();
            let request_id = ctx.request_id.clone();
            async move {
                let message = client.get_message(&id).await.map_err(|e| {
                    tracing::warn!(request_id = %request_id, message_id = %id, error = %e, "Failed to fetch message");
                    PipelineError::new(Stage::FetchContent, CONTENT_LABEL, e)
                })?;
                // A closed receiver means the request is being torn down.
                Ok(usize::from(tx.send(message).await.is_ok()))
            }
        })
        .await
    });

    (rx, handle)
}
