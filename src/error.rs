//! Error types for mail-harvest
//!
//! This module provides the error handling for the library, including:
//! - Domain-specific error types (Auth, Mail, Pipeline)
//! - HTTP status code mapping for API integration
//! - The JSON error body returned to clients
//! - Stage context for pipeline failures

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::Stage;

/// Result type alias for mail-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed underlying cause carried by a [`PipelineError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for mail-harvest
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_requests")
        key: Option<String>,
    },

    /// Bearer token missing, malformed, or not resolvable to a credential
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A harvesting stage failed
    #[error(transparent)]
    Pipeline(Arc<PipelineError>),

    /// Mail service call failed outside of a pipeline stage
    #[error("mail service error: {0}")]
    Mail(#[from] MailError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<PipelineError> for Error {
    fn from(error: PipelineError) -> Self {
        Error::Pipeline(Arc::new(error))
    }
}

impl From<Arc<PipelineError>> for Error {
    fn from(error: Arc<PipelineError>) -> Self {
        Error::Pipeline(error)
    }
}

/// Authentication errors raised before any pipeline stage starts
#[derive(Debug, Error)]
pub enum AuthError {
    /// The Authorization header is absent or not of the form `Bearer <token>`
    #[error("Bearer token not in proper format")]
    MalformedBearer,

    /// The bearer token does not map to a known credential
    #[error("no credential found for the supplied token")]
    UnknownToken,

    /// The credential resolver itself failed
    #[error("{0}")]
    Resolver(String),
}

/// Errors returned by a [`MailClient`](crate::mail::MailClient)
#[derive(Debug, Error)]
pub enum MailError {
    /// Underlying HTTP client error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP response returned a non-success status with body.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// The HTTP status code returned by the mail service
        status: u16,
        /// The response body (usually a JSON error document)
        body: String,
    },

    /// The mail service returned data that could not be interpreted
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The call was abandoned because the request was cancelled
    #[error("request cancelled")]
    Cancelled,
}

/// A labelled failure record produced by a harvesting stage
///
/// Displays as `"<label> <cause>"`, which is also the message returned to the
/// client.
#[derive(Debug, Error)]
#[error("{label} {source}")]
pub struct PipelineError {
    /// The stage that produced the failure
    pub stage: Stage,
    /// Fixed human-readable label (e.g. "Unable to retrieve Attachment")
    pub label: &'static str,
    /// The underlying cause
    #[source]
    pub source: BoxError,
}

impl PipelineError {
    /// Create a new pipeline error for `stage` with a fixed label and cause
    pub fn new(stage: Stage, label: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            stage,
            label,
            source: source.into(),
        }
    }
}

/// API error response format
///
/// This structure is returned by the API when a request fails.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": "Unable to retrieve Attachment unexpected status 404: not found"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Human-readable error message
    pub error: String,
}

impl ApiError {
    /// Create a new API error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - auth and remote-stage failures are reported to the caller
            Error::Auth(_) => 400,
            Error::Pipeline(e) => match e.stage {
                Stage::Assemble => 500,
                Stage::Enumerate | Stage::FetchContent | Stage::FetchAttachment => 400,
            },

            // 502 Bad Gateway - External service errors
            Error::Mail(_) => 502,

            // 500 Internal Server Error - Server-side issues
            Error::Config { .. } => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Auth(e) => match e {
                AuthError::MalformedBearer => "malformed_bearer",
                AuthError::UnknownToken => "unknown_token",
                AuthError::Resolver(_) => "credential_resolver_error",
            },
            Error::Pipeline(e) => match e.stage {
                Stage::Enumerate => "enumeration_error",
                Stage::FetchContent => "content_fetch_error",
                Stage::FetchAttachment => "attachment_fetch_error",
                Stage::Assemble => "assembly_error",
            },
            Error::Mail(_) => "mail_service_error",
            Error::Io(_) => "io_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError::new(error.to_string())
    }
}
