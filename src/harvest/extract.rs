//! Attachment extraction: walk each message's parts and fetch named payloads.

use crate::error::{MailError, PipelineError};
use crate::mail::MailClient;
use crate::types::{Attachment, Message, Stage};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::context::{HarvestContext, StageStats, drive_fan_out};

pub(crate) const ATTACHMENT_LABEL: &str = "Unable to retrieve Attachment";

/// Archive display name: the message date as `Mon-DD-YYYY`, a dash, then the original name.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// let date = Utc.with_ymd_and_hms(2019, 11, 20, 14, 3, 46).unwrap();
/// assert_eq!(
///     mail_harvest::harvest::display_filename(date, "attachmentfile.pdf"),
///     "Nov-20-2019-attachmentfile.pdf"
/// );
/// ```
pub fn display_filename(internal_date: DateTime<Utc>, original: &str) -> String {
    format!("{}-{}", internal_date.format("%b-%d-%Y"), original)
}

/// Spawn the attachment extractor over `messages`.
///
/// One future per message walks its parts in order; messages are processed
/// with bounded concurrency. The channel closes when every message is done or
/// the request is cancelled.
pub fn spawn_attachment_extractor(
    ctx: &HarvestContext,
    client: Arc<dyn MailClient>,
    messages: mpsc::Receiver<Message>,
) -> (mpsc::Receiver<Attachment>, JoinHandle<StageStats>) {
    let (tx, rx) = mpsc::channel(ctx.channel_capacity);
    let ctx = ctx.clone();

    let handle = tokio::spawn(async move {
        drive_fan_out(&ctx, Stage::FetchAttachment, messages, |message| {
            let client = Arc::clone(&client);
            let tx = tx.clone();
            let request_id = ctx.request_id.clone();
            async move {
                extract_message(client.as_ref(), message, &tx)
                    .await
                    .inspect_err(|e| {
                        tracing::warn!(request_id = %request_id, error = %e, "Failed to extract attachments");
                    })
            }
        })
        .await
    });

    (rx, handle)
}

/// Push every named part of `message` as an [`Attachment`], returning how many were sent.
async fn extract_message(
    client: &dyn MailClient,
    message: Message,
    tx: &mpsc::Sender<Attachment>,
) -> Result<usize, PipelineError> {
    let mut emitted = 0;

    for part in &message.parts {
        let Some(original) = part.named() else {
            continue;
        };

        let data = match (&part.attachment_id, &part.inline_data) {
            (Some(attachment_id), _) => {
                client
                    .get_attachment(&message.id, attachment_id)
                    .await
                    .map_err(|e| PipelineError::new(Stage::FetchAttachment, ATTACHMENT_LABEL, e))?
                    .data
            }
            (None, Some(inline)) => inline.clone(),
            (None, None) => {
                return Err(PipelineError::new(
                    Stage::FetchAttachment,
                    ATTACHMENT_LABEL,
                    MailError::Malformed(format!(
                        "part {original:?} of message {} has no body",
                        message.id
                    )),
                ));
            }
        };

        let attachment = Attachment {
            message_id: message.id.clone(),
            filename: display_filename(message.internal_date, original),
            data,
        };
        if tx.send(attachment).await.is_err() {
            break;
        }
        emitted += 1;
    }

    Ok(emitted)
}
