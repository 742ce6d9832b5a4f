//! Application state for the API server

use crate::Config;
use crate::auth::CredentialResolver;
use crate::harvest::Harvester;
use crate::mail::MailConnector;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clones).
#[derive(Clone)]
pub struct AppState {
    /// Pipeline runner
    pub harvester: Arc<Harvester>,

    /// Maps bearer tokens to mail credentials
    pub resolver: Arc<dyn CredentialResolver>,

    /// Builds a mail client per credential
    pub connector: Arc<dyn MailConnector>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState; the harvester is built from `config.harvest`.
    pub fn new(
        config: Arc<Config>,
        resolver: Arc<dyn CredentialResolver>,
        connector: Arc<dyn MailConnector>,
    ) -> Self {
        Self {
            harvester: Arc::new(Harvester::new(config.harvest.clone())),
            resolver,
            connector,
            config,
        }
    }
}
