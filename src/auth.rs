//! Bearer-token extraction and credential resolution
//!
//! Issuing and verifying session tokens is handled elsewhere; this module
//! only pulls the token out of the `Authorization` header and asks a
//! [`CredentialResolver`] for the mail credential it stands for.

use crate::error::AuthError;
use crate::types::Credential;
use axum::http::{HeaderMap, header::AUTHORIZATION};
use std::collections::HashMap;
use std::sync::RwLock;

/// Extract the bearer token from the `Authorization` header.
///
/// A missing or non-UTF-8 header is treated as malformed.
pub fn extract_bearer(headers: &HeaderMap) -> Result<String, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MalformedBearer)?
        .to_str()
        .map_err(|_| AuthError::MalformedBearer)?;
    parse_bearer(value)
}

/// Parse an `Authorization` header value of the form `Bearer <token>`.
///
/// The value split on `"Bearer"` must yield exactly two pieces; the token is
/// the second piece with surrounding whitespace removed and must not be empty.
///
/// ```
/// use mail_harvest::auth::parse_bearer;
/// assert_eq!(parse_bearer("Bearer abc123").unwrap(), "abc123");
/// assert!(parse_bearer("sometokenhere").is_err());
/// ```
pub fn parse_bearer(value: &str) -> Result<String, AuthError> {
    let pieces: Vec<&str> = value.split("Bearer").collect();
    if pieces.len() != 2 {
        return Err(AuthError::MalformedBearer);
    }
    let token = pieces[1].trim();
    if token.is_empty() {
        return Err(AuthError::MalformedBearer);
    }
    Ok(token.to_string())
}

/// Maps a bearer token to the mail credential it authorises.
#[async_trait::async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolve `token`, failing with [`AuthError::UnknownToken`] when it is not recognised.
    async fn resolve(&self, token: &str) -> Result<Credential, AuthError>;
}

/// Resolver backed by an in-process map, for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryCredentialResolver {
    credentials: RwLock<HashMap<String, Credential>>,
}

impl InMemoryCredentialResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_token(self, token: impl Into<String>, credential: Credential) -> Self {
        self.insert(token, credential);
        self
    }

    /// Register (or replace) the credential for `token`.
    pub fn insert(&self, token: impl Into<String>, credential: Credential) {
        match self.credentials.write() {
            Ok(mut map) => {
                map.insert(token.into(), credential);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(token.into(), credential);
            }
        }
    }

    /// Forget `token`. Returns whether it was registered.
    pub fn revoke(&self, token: &str) -> bool {
        match self.credentials.write() {
            Ok(mut map) => map.remove(token).is_some(),
            Err(poisoned) => poisoned.into_inner().remove(token).is_some(),
        }
    }
}

#[async_trait::async_trait]
impl CredentialResolver for InMemoryCredentialResolver {
    async fn resolve(&self, token: &str) -> Result<Credential, AuthError> {
        let map = self
            .credentials
            .read()
            .map_err(|_| AuthError::Resolver("credential store lock poisoned".to_string()))?;
        map.get(token).cloned().ok_or(AuthError::UnknownToken)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_is_extracted_and_trimmed() {
        let headers = headers_with("Bearer   ya29.token-value  ");
        assert_eq!(extract_bearer(&headers).unwrap(), "ya29.token-value");
    }

    #[test]
    fn token_without_bearer_prefix_is_malformed() {
        let err = extract_bearer(&headers_with("sometokenhere")).unwrap_err();
        assert_eq!(err.to_string(), "Bearer token not in proper format");
    }

    #[test]
    fn missing_header_is_malformed() {
        assert!(matches!(
            extract_bearer(&HeaderMap::new()),
            Err(AuthError::MalformedBearer)
        ));
    }

    #[test]
    fn empty_token_is_malformed() {
        assert!(matches!(
            parse_bearer("Bearer    "),
            Err(AuthError::MalformedBearer)
        ));
    }

    #[test]
    fn repeated_bearer_keyword_is_malformed() {
        assert!(parse_bearer("Bearer Bearer abc").is_err());
    }

    #[test]
    fn lowercase_scheme_is_malformed() {
        assert!(parse_bearer("bearer abc").is_err());
    }

    #[tokio::test]
    async fn in_memory_resolver_round_trip() {
        let resolver =
            InMemoryCredentialResolver::new().with_token("session-1", Credential::new("access-1"));

        let credential = resolver.resolve("session-1").await.unwrap();
        assert_eq!(credential.access_token, "access-1");

        assert!(matches!(
            resolver.resolve("session-2").await,
            Err(AuthError::UnknownToken)
        ));

        assert!(resolver.revoke("session-1"));
        assert!(resolver.resolve("session-1").await.is_err());
    }
}
