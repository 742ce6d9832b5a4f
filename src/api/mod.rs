//! REST API server module
//!
//! Exposes the attachment harvest over HTTP, plus health and OpenAPI endpoints.

use crate::Result;
use crate::error::Error;
use axum::{Router, routing::get};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// - `GET /download/attachment` - Harvest attachments, sender in the query string
/// - `POST /download/attachment` - Same, sender in the query string or a form body
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/download/attachment",
            get(routes::download_attachment).post(routes::download_attachment_form),
        )
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the API on an already-bound listener until `shutdown` resolves.
///
/// In-flight requests are allowed to finish after `shutdown` fires.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

/// Start the API server on the configured bind address.
///
/// Runs until SIGTERM or SIGINT (Ctrl+C on non-Unix platforms) is received.
///
/// # Example
///
/// ```no_run
/// use mail_harvest::api::{AppState, start_api_server};
/// use mail_harvest::auth::InMemoryCredentialResolver;
/// use mail_harvest::mail::GmailConnector;
/// use mail_harvest::Config;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::from_env()?);
/// let connector = Arc::new(GmailConnector::new(&config.mail)?);
/// let resolver = Arc::new(InMemoryCredentialResolver::new());
///
/// start_api_server(AppState::new(config, resolver, connector)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(state: AppState) -> Result<()> {
    let bind_address = state.config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let listener = TcpListener::bind(bind_address).await.map_err(Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    serve(listener, state, crate::wait_for_signal()).await
}
