//! In-memory [`MailClient`] for unit tests.

use super::{MailClient, MailConnector};
use crate::error::MailError;
use crate::types::{
    AttachmentBody, Credential, ListPage, Message, MessageId, MessagePart, MessageSummary,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 11/20/2019 2:03:46 PM UTC
pub(crate) fn sample_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 11, 20, 14, 3, 46).unwrap()
}

pub(crate) fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Mailbox contents plus injected failures and latency.
#[derive(Default)]
pub(crate) struct MockMailClient {
    pages: Vec<Vec<MessageId>>,
    fail_page: Option<usize>,
    messages: HashMap<MessageId, Message>,
    attachments: HashMap<(MessageId, String), String>,
    fail_messages: HashSet<MessageId>,
    fail_attachments: HashSet<String>,
    slow_messages: HashSet<MessageId>,
    message_delay: Duration,
    slow_delay: Duration,

    queries: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    messages_served: AtomicUsize,
    attachment_calls: AtomicUsize,
}

impl MockMailClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A listing page; pages are served in the order they are added.
    pub(crate) fn page<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<MessageId>,
    {
        self.pages.push(ids.into_iter().map(Into::into).collect());
        self
    }

    pub(crate) fn fail_page(mut self, index: usize) -> Self {
        self.fail_page = Some(index);
        self
    }

    pub(crate) fn message(mut self, message: Message) -> Self {
        self.messages.insert(message.id.clone(), message);
        self
    }

    /// A message dated [`sample_date`] with one stored attachment per `(filename, payload)`.
    pub(crate) fn message_with_files(mut self, id: &str, files: &[(&str, &[u8])]) -> Self {
        let id = MessageId::new(id);
        let mut parts = vec![MessagePart {
            filename: Some(String::new()),
            attachment_id: None,
            inline_data: Some(encode(b"message body")),
        }];
        for (index, (filename, payload)) in files.iter().enumerate() {
            let attachment_id = format!("{id}-att-{index}");
            self.attachments
                .insert((id.clone(), attachment_id.clone()), encode(payload));
            parts.push(MessagePart {
                filename: Some((*filename).to_string()),
                attachment_id: Some(attachment_id),
                inline_data: None,
            });
        }
        self.messages.insert(
            id.clone(),
            Message {
                id,
                internal_date: sample_date(),
                parts,
            },
        );
        self
    }

    /// Override the stored payload of an attachment with raw (possibly invalid) data.
    pub(crate) fn raw_attachment(mut self, message_id: &str, attachment_id: &str, data: &str) -> Self {
        self.attachments.insert(
            (MessageId::new(message_id), attachment_id.to_string()),
            data.to_string(),
        );
        self
    }

    pub(crate) fn fail_message(mut self, id: &str) -> Self {
        self.fail_messages.insert(MessageId::new(id));
        self
    }

    pub(crate) fn fail_attachment(mut self, attachment_id: &str) -> Self {
        self.fail_attachments.insert(attachment_id.to_string());
        self
    }

    pub(crate) fn message_delay(mut self, delay: Duration) -> Self {
        self.message_delay = delay;
        self
    }

    pub(crate) fn slow_message(mut self, id: &str, delay: Duration) -> Self {
        self.slow_messages.insert(MessageId::new(id));
        self.slow_delay = delay;
        self
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn messages_served(&self) -> usize {
        self.messages_served.load(Ordering::SeqCst)
    }

    pub(crate) fn attachment_calls(&self) -> usize {
        self.attachment_calls.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter even when the call is dropped mid-await.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn not_found(what: &str) -> MailError {
    MailError::Status {
        status: 404,
        body: format!("{what} not found"),
    }
}

#[async_trait::async_trait]
impl MailClient for MockMailClient {
    async fn list_messages(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<ListPage, MailError> {
        self.queries.lock().unwrap().push(query.to_string());

        let index = match page_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| MailError::Malformed(format!("bad page token {token}")))?,
        };
        if self.fail_page == Some(index) {
            return Err(MailError::Status {
                status: 500,
                body: "backend error".to_string(),
            });
        }

        let Some(ids) = self.pages.get(index) else {
            return Ok(ListPage::default());
        };
        Ok(ListPage {
            messages: ids
                .iter()
                .map(|id| MessageSummary { id: id.clone() })
                .collect(),
            next_page_token: (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1)),
        })
    }

    async fn get_message(&self, id: &MessageId) -> Result<Message, MailError> {
        let _guard = InFlight::enter(&self.in_flight, &self.peak_in_flight);

        if self.slow_messages.contains(id) {
            tokio::time::sleep(self.slow_delay).await;
        } else if !self.message_delay.is_zero() {
            tokio::time::sleep(self.message_delay).await;
        }

        if self.fail_messages.contains(id) {
            return Err(not_found(&format!("message {id}")));
        }
        let message = self
            .messages
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(&format!("message {id}")))?;
        self.messages_served.fetch_add(1, Ordering::SeqCst);
        Ok(message)
    }

    async fn get_attachment(
        &self,
        message_id: &MessageId,
        attachment_id: &str,
    ) -> Result<AttachmentBody, MailError> {
        self.attachment_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_attachments.contains(attachment_id) {
            return Err(not_found(&format!("attachment {attachment_id}")));
        }
        self.attachments
            .get(&(message_id.clone(), attachment_id.to_string()))
            .map(|data| AttachmentBody { data: data.clone() })
            .ok_or_else(|| not_found(&format!("attachment {attachment_id}")))
    }
}

/// Hands out the same mock for every credential and remembers which tokens it saw.
pub(crate) struct MockConnector {
    pub(crate) client: Arc<MockMailClient>,
    pub(crate) tokens: Mutex<Vec<String>>,
}

impl MockConnector {
    pub(crate) fn new(client: MockMailClient) -> Self {
        Self {
            client: Arc::new(client),
            tokens: Mutex::new(Vec::new()),
        }
    }
}

impl MailConnector for MockConnector {
    fn connect(&self, credential: &Credential) -> Arc<dyn MailClient> {
        self.tokens
            .lock()
            .unwrap()
            .push(credential.access_token.clone());
        self.client.clone()
    }
}
