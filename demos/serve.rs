//! Serve the attachment download API.
//!
//! Session tokens are mapped to Gmail access tokens in memory. Set
//! `HARVEST_SESSION_TOKEN` and `GMAIL_ACCESS_TOKEN` to register one pair, then:
//!
//! ```text
//! curl -H "Authorization: Bearer $HARVEST_SESSION_TOKEN" \
//!     "http://localhost:4747/download/attachment?emailThatSentAttach=reports@example.com" \
//!     -o attachments.zip
//! ```
//!
//! Run with: cargo run --example serve

use mail_harvest::auth::InMemoryCredentialResolver;
use mail_harvest::{Config, Credential, run_with_shutdown};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mail_harvest=info")),
        )
        .init();

    let config = Config::from_env()?;

    let mut resolver = InMemoryCredentialResolver::new();
    match (
        std::env::var("HARVEST_SESSION_TOKEN"),
        std::env::var("GMAIL_ACCESS_TOKEN"),
    ) {
        (Ok(session), Ok(access)) => {
            resolver = resolver.with_token(&session, Credential::new(&access));
            tracing::info!("registered one session token");
        }
        _ => {
            tracing::warn!(
                "HARVEST_SESSION_TOKEN or GMAIL_ACCESS_TOKEN not set, every request will be rejected"
            );
        }
    }

    tracing::info!(address = %config.api.bind_address, "starting attachment API");
    run_with_shutdown(config, Arc::new(resolver)).await?;

    Ok(())
}
