//! Run the real router on an ephemeral port against a fake Gmail API.

use super::GMAIL_ACCESS_TOKEN;
use mail_harvest::api::{AppState, serve};
use mail_harvest::auth::InMemoryCredentialResolver;
use mail_harvest::mail::GmailConnector;
use mail_harvest::{Config, Credential, HarvestConfig, MailApiConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Session token accepted by the test server's credential resolver.
pub const SESSION_TOKEN: &str = "session-abc";

pub struct TestServer {
    pub base_url: String,
    pub archive_dir: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<mail_harvest::Result<()>>,
}

impl TestServer {
    /// Start the API with Gmail calls routed to `gmail_base_url`.
    pub async fn start(gmail_base_url: &str) -> Self {
        let archive_dir = TempDir::new().unwrap();
        let config = Config {
            harvest: HarvestConfig {
                max_concurrent_requests: 4,
                channel_capacity: 8,
                archive_dir: archive_dir.path().to_path_buf(),
            },
            mail: MailApiConfig {
                base_url: gmail_base_url.to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        config.validate().unwrap();

        let connector = Arc::new(GmailConnector::new(&config.mail).unwrap());
        let resolver = Arc::new(
            InMemoryCredentialResolver::new()
                .with_token(SESSION_TOKEN, Credential::new(GMAIL_ACCESS_TOKEN)),
        );
        let state = AppState::new(Arc::new(config), resolver, connector);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(listener, state, async move {
            rx.await.ok();
        }));

        Self {
            base_url,
            archive_dir,
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }

    /// Signal graceful shutdown and wait for the server task.
    pub async fn stop(mut self) -> mail_harvest::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), &mut self.handle)
            .await
            .expect("server did not shut down in time")
            .expect("server task panicked")
    }
}

/// Wait until `dir` is empty (the archive is removed once the response body is dropped).
pub async fn wait_until_empty(dir: &Path) -> bool {
    for _ in 0..100 {
        if std::fs::read_dir(dir).unwrap().next().is_none() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
