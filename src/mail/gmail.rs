//! Gmail REST implementation of [`MailClient`]

use super::{MailClient, MailConnector};
use crate::config::MailApiConfig;
use crate::error::{Error, MailError};
use crate::types::{AttachmentBody, Credential, ListPage, Message, MessageId, MessagePart, MessageSummary};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

/// Shared HTTP settings from which per-credential [`GmailClient`]s are built.
///
/// The underlying `reqwest::Client` (and its connection pool) is shared by
/// every client this connector hands out.
#[derive(Clone, Debug)]
pub struct GmailConnector {
    http: reqwest::Client,
    base_url: Url,
    user_id: String,
}

impl GmailConnector {
    /// Create a connector from mail API settings.
    pub fn new(config: &MailApiConfig) -> Result<Self, Error> {
        let base_url = Url::parse(&config.base_url).map_err(|e| Error::Config {
            message: format!("invalid mail API base URL {}: {}", config.base_url, e),
            key: Some("base_url".to_string()),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config {
                message: format!("mail API base URL cannot be a base: {}", config.base_url),
                key: Some("base_url".to_string()),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(MailError::Http)?;

        Ok(Self {
            http,
            base_url,
            user_id: config.user_id.clone(),
        })
    }
}

impl MailConnector for GmailConnector {
    fn connect(&self, credential: &Credential) -> Arc<dyn MailClient> {
        Arc::new(GmailClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            user_id: self.user_id.clone(),
            access_token: credential.access_token.clone(),
        })
    }
}

/// Gmail API client authenticated with a single access token.
pub struct GmailClient {
    http: reqwest::Client,
    base_url: Url,
    user_id: String,
    access_token: String,
}

impl GmailClient {
    /// `{base}/gmail/v1/users/{user}/messages/{extra...}`
    fn messages_url(&self, extra: &[&str]) -> Result<Url, MailError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MailError::Malformed("mail API base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["gmail", "v1", "users", self.user_id.as_str(), "messages"])
            .extend(extra);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, MailError> {
        let response = request.bearer_auth(&self.access_token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MailError::Malformed(e.to_string()))
    }
}

#[async_trait::async_trait]
impl MailClient for GmailClient {
    async fn list_messages(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<ListPage, MailError> {
        let url = self.messages_url(&[])?;
        let mut request = self.http.get(url).query(&[("q", query)]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let wire: WireListResponse = self.get_json(request).await?;
        Ok(ListPage {
            messages: wire
                .messages
                .into_iter()
                .map(|m| MessageSummary {
                    id: MessageId(m.id),
                })
                .collect(),
            next_page_token: wire.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn get_message(&self, id: &MessageId) -> Result<Message, MailError> {
        let url = self.messages_url(&[id.as_str()])?;
        let wire: WireMessage = self.get_json(self.http.get(url)).await?;
        wire.into_message()
    }

    async fn get_attachment(
        &self,
        message_id: &MessageId,
        attachment_id: &str,
    ) -> Result<AttachmentBody, MailError> {
        let url = self.messages_url(&[message_id.as_str(), "attachments", attachment_id])?;
        let wire: WireAttachment = self.get_json(self.http.get(url)).await?;
        Ok(AttachmentBody { data: wire.data })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireListResponse {
    #[serde(default)]
    messages: Vec<WireSummary>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireSummary {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    id: String,
    internal_date: Option<String>,
    payload: Option<WirePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    filename: Option<String>,
    body: Option<WireBody>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBody {
    attachment_id: Option<String>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAttachment {
    data: String,
}

impl WireMessage {
    fn into_message(self) -> Result<Message, MailError> {
        let raw_date = self.internal_date.ok_or_else(|| {
            MailError::Malformed(format!("message {} has no internalDate", self.id))
        })?;
        let internal_date = parse_internal_date(&raw_date)?;

        let mut parts = Vec::new();
        if let Some(payload) = self.payload {
            flatten_parts(payload, &mut parts);
        }

        Ok(Message {
            id: MessageId(self.id),
            internal_date,
            parts,
        })
    }
}

/// Gmail reports `internalDate` as epoch milliseconds in a string.
fn parse_internal_date(raw: &str) -> Result<DateTime<Utc>, MailError> {
    let millis: i64 = raw
        .parse()
        .map_err(|e| MailError::Malformed(format!("invalid internalDate {raw:?}: {e}")))?;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| MailError::Malformed(format!("internalDate out of range: {millis}")))
}

/// Depth-first, parent before children.
///
/// A named part is a leaf: the children of an attached `message/rfc822` are
/// already inside its payload, so they are not listed again.
fn flatten_parts(part: WirePart, out: &mut Vec<MessagePart>) {
    let (attachment_id, inline_data) = match part.body {
        Some(body) => (
            body.attachment_id.filter(|id| !id.is_empty()),
            body.data.filter(|data| !data.is_empty()),
        ),
        None => (None, None),
    };
    let is_named = part.filename.as_deref().is_some_and(|name| !name.is_empty());
    out.push(MessagePart {
        filename: part.filename,
        attachment_id,
        inline_data,
    });
    if is_named {
        return;
    }
    for child in part.parts {
        flatten_parts(child, out);
    }
}
