//! Core types for mail-harvest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a message within a mailbox
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new MessageId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access credential for the mail service, valid for one request
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// OAuth access token sent as `Authorization: Bearer`
    pub access_token: String,
    /// Refresh token, if the session carries one
    pub refresh_token: Option<String>,
    /// Access token expiry
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Create a credential from a bare access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expiry: None,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// One entry of a message listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageSummary {
    /// Message identifier
    pub id: MessageId,
}

/// One page of a message listing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Messages on this page
    pub messages: Vec<MessageSummary>,
    /// Continuation token; `None` on the last page
    pub next_page_token: Option<String>,
}

/// A message part as seen by the harvester
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessagePart {
    /// Original filename; empty or absent for body parts
    pub filename: Option<String>,
    /// Identifier of the externally stored body
    pub attachment_id: Option<String>,
    /// Base64url body data, when the service inlined it
    pub inline_data: Option<String>,
}

impl MessagePart {
    /// The filename, if present and non-empty
    pub fn named(&self) -> Option<&str> {
        self.filename.as_deref().filter(|name| !name.is_empty())
    }
}

/// Message content: identifier, internal timestamp and flattened parts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Message identifier
    pub id: MessageId,
    /// Time the mail service received the message
    pub internal_date: DateTime<Utc>,
    /// Parts in document order
    pub parts: Vec<MessagePart>,
}

/// Body of an attachment as returned by the mail service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentBody {
    /// Base64url-encoded payload
    pub data: String,
}

/// An attachment travelling from the extractor to the assembler
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Message the attachment belongs to
    pub message_id: MessageId,
    /// Display filename, `<Mon-DD-YYYY>-<original>`
    pub filename: String,
    /// Base64url-encoded payload, decoded by the assembler
    pub data: String,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("message_id", &self.message_id)
            .field("filename", &self.filename)
            .field("encoded_len", &self.data.len())
            .finish()
    }
}

/// Pipeline stage, used to label failures
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Paginated message-ID listing
    Enumerate,
    /// Per-message content retrieval
    FetchContent,
    /// Per-part attachment retrieval (and payload decoding)
    FetchAttachment,
    /// Writing the zip archive
    Assemble,
}

impl Stage {
    /// Stable lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Enumerate => "enumerate",
            Stage::FetchContent => "fetch_content",
            Stage::FetchAttachment => "fetch_attachment",
            Stage::Assemble => "assemble",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request lifecycle states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    /// Bearer token extracted and resolved
    AuthExtracted,
    /// All listing pages fetched
    EnumerationDone,
    /// Every message body fetched
    ContentFetched,
    /// Every attachment fetched
    AttachmentsFetched,
    /// Archive writer running or finalising
    Assembling,
    /// Archive finalised and handed to the responder
    Served,
    /// A stage failed; terminal
    Error,
}

impl RequestState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Served | RequestState::Error)
    }
}
