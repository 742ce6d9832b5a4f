//! A fake Gmail REST API on top of wiremock.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Access token the fake API expects on every call.
pub const GMAIL_ACCESS_TOKEN: &str = "gmail-access";

/// 11/20/2019 2:03:46 PM UTC in epoch milliseconds.
pub const SAMPLE_INTERNAL_DATE_MS: i64 = 1_574_258_626_000;

/// A message with stored attachments.
#[derive(Clone, Debug)]
pub struct FakeMessage {
    pub id: String,
    pub attachments: Vec<(String, Vec<u8>)>,
}

impl FakeMessage {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, filename: &str, payload: &[u8]) -> Self {
        self.attachments.push((filename.to_string(), payload.to_vec()));
        self
    }

    pub fn attachment_id(&self, index: usize) -> String {
        format!("{}-att-{}", self.id, index)
    }

    fn as_json(&self) -> Value {
        let mut parts = vec![json!({
            "partId": "0",
            "mimeType": "text/plain",
            "filename": "",
            "body": { "size": 5, "data": URL_SAFE_NO_PAD.encode(b"hello") }
        })];
        for (index, (filename, payload)) in self.attachments.iter().enumerate() {
            parts.push(json!({
                "partId": (index + 1).to_string(),
                "mimeType": "application/octet-stream",
                "filename": filename,
                "body": { "size": payload.len(), "attachmentId": self.attachment_id(index) }
            }));
        }

        json!({
            "id": self.id,
            "threadId": format!("thread-{}", self.id),
            "internalDate": SAMPLE_INTERNAL_DATE_MS.to_string(),
            "payload": {
                "partId": "",
                "mimeType": "multipart/mixed",
                "filename": "",
                "body": { "size": 0 },
                "parts": parts
            }
        })
    }
}

fn messages_path(suffix: &str) -> String {
    format!("/gmail/v1/users/me/messages{suffix}")
}

/// Mount listing pages for `sender`; page `i > 0` is reached with token `page-i`.
pub async fn mount_listing(server: &MockServer, sender: &str, pages: &[Vec<FakeMessage>]) {
    for (index, page) in pages.iter().enumerate() {
        let mut body = json!({
            "messages": page
                .iter()
                .map(|m| json!({ "id": m.id, "threadId": format!("thread-{}", m.id) }))
                .collect::<Vec<_>>(),
            "resultSizeEstimate": page.len()
        });
        if index + 1 < pages.len() {
            body["nextPageToken"] = json!(format!("page-{}", index + 1));
        }

        let mock = Mock::given(method("GET"))
            .and(path(messages_path("")))
            .and(query_param("q", format!("from:{sender}")))
            .and(header("authorization", format!("Bearer {GMAIL_ACCESS_TOKEN}").as_str()));
        let mock = if index == 0 {
            mock.and(query_param_is_missing("pageToken"))
        } else {
            mock.and(query_param("pageToken", format!("page-{index}")))
        };
        mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }
}

/// Mount message and attachment endpoints for every message.
pub async fn mount_messages(server: &MockServer, messages: &[FakeMessage]) {
    for message in messages {
        Mock::given(method("GET"))
            .and(path(messages_path(&format!("/{}", message.id))))
            .respond_with(ResponseTemplate::new(200).set_body_json(message.as_json()))
            .mount(server)
            .await;

        for (index, (_, payload)) in message.attachments.iter().enumerate() {
            Mock::given(method("GET"))
                .and(path(messages_path(&format!(
                    "/{}/attachments/{}",
                    message.id,
                    message.attachment_id(index)
                ))))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "size": payload.len(),
                    "data": URL_SAFE_NO_PAD.encode(payload)
                })))
                .mount(server)
                .await;
        }
    }
}

/// Single-page mailbox for `sender` containing `messages`.
pub async fn mount_mailbox(server: &MockServer, sender: &str, messages: &[FakeMessage]) {
    mount_listing(server, sender, &[messages.to_vec()]).await;
    mount_messages(server, messages).await;
}

/// Make the listing for `sender` fail with `status`.
pub async fn mount_failing_listing(server: &MockServer, sender: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(messages_path("")))
        .and(query_param("q", format!("from:{sender}")))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "error": { "code": status, "message": "Backend Error" }
        })))
        .mount(server)
        .await;
}

/// Make one attachment fetch fail with 404.
pub async fn mount_missing_attachment(server: &MockServer, message_id: &str, attachment_id: &str) {
    Mock::given(method("GET"))
        .and(path(messages_path(&format!(
            "/{message_id}/attachments/{attachment_id}"
        ))))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "Requested entity was not found." }
        })))
        .with_priority(1)
        .mount(server)
        .await;
}
