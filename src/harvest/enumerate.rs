//! Message-ID enumeration: paginated listing for one sender.

use crate::error::{MailError, PipelineError};
use crate::mail::MailClient;
use crate::types::{MessageId, Stage};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::HarvestContext;

pub(crate) const LIST_LABEL: &str = "Unable to retrieve Messages";
pub(crate) const NEXT_PAGE_LABEL: &str = "Unable to retrieve Messages on the next page";

/// Mail search query selecting everything sent by `sender`.
pub fn sender_query(sender: &str) -> String {
    format!("from:{sender}")
}

/// List every message from `sender` and stream the identifiers.
///
/// All pages are fetched before anything is emitted, so a failure on any page
/// yields an error and no stream. Duplicate identifiers across pages are
/// emitted once. An empty mailbox yields a stream that closes immediately.
pub async fn enumerate_ids(
    ctx: &HarvestContext,
    client: Arc<dyn MailClient>,
    sender: &str,
) -> Result<mpsc::Receiver<MessageId>, PipelineError> {
    let query = sender_query(sender);
    let ids = list_all(ctx, client.as_ref(), &query).await?;

    tracing::info!(
        request_id = %ctx.request_id,
        messages = ids.len(),
        "Enumerated messages"
    );

    let (tx, rx) = mpsc::channel(ctx.channel_capacity);
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        for id in ids {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = tx.send(id) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
    });

    Ok(rx)
}

async fn list_all(
    ctx: &HarvestContext,
    client: &dyn MailClient,
    query: &str,
) -> Result<Vec<MessageId>, PipelineError> {
    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let label = if page_token.is_none() {
            LIST_LABEL
        } else {
            NEXT_PAGE_LABEL
        };

        let result = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(MailError::Cancelled),
            page = client.list_messages(query, page_token.as_deref()) => page,
        };
        let page = result.map_err(|e| {
            tracing::warn!(request_id = %ctx.request_id, pages, error = %e, "Failed to list messages");
            PipelineError::new(Stage::Enumerate, label, e)
        })?;
        pages += 1;

        for summary in page.messages {
            if seen.insert(summary.id.clone()) {
                ids.push(summary.id);
            }
        }

        match page.next_page_token {
            Some(token) => {
                tracing::debug!(request_id = %ctx.request_id, pages, "Fetching next listing page");
                page_token = Some(token);
            }
            None => break,
        }
    }

    Ok(ids)
}
