//! # mail-harvest
//!
//! Collect every attachment a given sender mailed you into one zip archive.
//!
//! ## Design
//!
//! - **Streaming pipeline** - enumeration, content fetch, attachment fetch and
//!   archive assembly run concurrently over bounded channels
//! - **Bounded fan-out** - at most `max_concurrent_requests` mail API calls in
//!   flight per stage
//! - **Fail fast** - the first stage failure cancels the whole request and no
//!   archive is served
//! - **Library-first** - the HTTP surface in [`api`] is a thin layer over
//!   [`harvest::Harvester`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use mail_harvest::harvest::Harvester;
//! use mail_harvest::mail::{GmailConnector, MailConnector};
//! use mail_harvest::{Config, Credential};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let connector = GmailConnector::new(&config.mail)?;
//!     let client = connector.connect(&Credential::new("ya29.access-token"));
//!
//!     let harvested = Harvester::new(config.harvest.clone())
//!         .harvest(client, "reports@example.com")
//!         .await?;
//!     println!(
//!         "{} attachments in {}",
//!         harvested.entry_count(),
//!         harvested.archive.path().display()
//!     );
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Bearer extraction and credential resolution
pub mod auth;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Attachment harvesting pipeline
pub mod harvest;
/// Mail service clients
pub mod mail;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, Config, HarvestConfig, MailApiConfig};
pub use error::{ApiError, AuthError, Error, MailError, PipelineError, Result, ToHttpStatus};
pub use harvest::{HarvestedArchive, Harvester};
pub use types::{Attachment, Credential, Message, MessageId, MessagePart, RequestState, Stage};

/// Build the API state from `config` and serve until a termination signal arrives.
///
/// In-flight downloads finish before the server returns.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use mail_harvest::auth::InMemoryCredentialResolver;
/// use mail_harvest::{Config, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::from_env()?;
///     run_with_shutdown(config, Arc::new(InMemoryCredentialResolver::new())).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(
    config: Config,
    resolver: std::sync::Arc<dyn auth::CredentialResolver>,
) -> Result<()> {
    let connector = std::sync::Arc::new(mail::GmailConnector::new(&config.mail)?);
    let state = api::AppState::new(std::sync::Arc::new(config), resolver, connector);
    api::start_api_server(state).await
}

#[cfg(unix)]
pub(crate) async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
pub(crate) async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
