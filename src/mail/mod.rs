//! Mail service client abstraction
//!
//! The harvesting pipeline only talks to the mailbox through [`MailClient`].
//! [`MailConnector`] turns a per-request [`Credential`] into a client, so the
//! HTTP layer never holds a long-lived authenticated client.

use crate::error::MailError;
use crate::types::{AttachmentBody, Credential, ListPage, Message, MessageId};
use std::sync::Arc;

mod gmail;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod mock;

pub use gmail::{GmailClient, GmailConnector};

/// Read-only access to one user's mailbox.
#[async_trait::async_trait]
pub trait MailClient: Send + Sync {
    /// List messages matching `query`, starting at `page_token` when given.
    async fn list_messages(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<ListPage, MailError>;

    /// Fetch a single message with its flattened part list.
    async fn get_message(&self, id: &MessageId) -> Result<Message, MailError>;

    /// Fetch an externally stored attachment body.
    async fn get_attachment(
        &self,
        message_id: &MessageId,
        attachment_id: &str,
    ) -> Result<AttachmentBody, MailError>;
}

/// Builds a [`MailClient`] bound to a credential.
pub trait MailConnector: Send + Sync {
    /// Create a client that authenticates every call with `credential`.
    fn connect(&self, credential: &Credential) -> Arc<dyn MailClient>;
}
