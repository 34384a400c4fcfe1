//! Caller identity resolution.
//!
//! Identity comes from ambient session state (a session cookie), never from
//! the request body. The provider distinguishes "no user for this session"
//! from "the provider itself failed": the handler maps the former to 401 and
//! the latter to a logged 500.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::chat::AuthenticatedUser;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("identity provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves the user for a session token.
    ///
    /// `Ok(None)` means the session carries no authenticated user; `Err`
    /// means the provider could not answer at all.
    async fn resolve_user(
        &self,
        session_token: Option<&str>,
    ) -> Result<Option<AuthenticatedUser>, IdentityError>;
}

/// Identity provider backed by an auth service's REST endpoint.
///
/// Sends the session token as a bearer credential to `{base_url}/auth/v1/user`
/// and reads the user id from the response.
pub struct RestIdentityProvider {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl RestIdentityProvider {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            service_key: service_key.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn resolve_user(
        &self,
        session_token: Option<&str>,
    ) -> Result<Option<AuthenticatedUser>, IdentityError> {
        let Some(token) = session_token else {
            return Ok(None);
        };

        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(IdentityError::Provider(format!(
                "auth service returned {status}"
            )));
        }

        let user: AuthenticatedUser = response
            .json()
            .await
            .map_err(|e| IdentityError::Provider(format!("malformed user payload: {e}")))?;

        Ok(Some(user))
    }
}

/// Fixed token-to-user table. Used when no auth service is configured (every
/// session resolves to no user) and as a fixture in handler tests.
#[derive(Default)]
pub struct StaticIdentityProvider {
    users: HashMap<String, String>,
}

impl StaticIdentityProvider {
    #[must_use]
    pub fn with_user(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.users.insert(token.into(), user_id.into());
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve_user(
        &self,
        session_token: Option<&str>,
    ) -> Result<Option<AuthenticatedUser>, IdentityError> {
        Ok(session_token
            .and_then(|token| self.users.get(token))
            .map(|id| AuthenticatedUser { id: id.clone() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_resolves_known_token() {
        let provider = StaticIdentityProvider::default().with_user("tok-1", "user-1");

        let user = provider.resolve_user(Some("tok-1")).await.unwrap();
        assert_eq!(user, Some(AuthenticatedUser { id: "user-1".into() }));
    }

    #[tokio::test]
    async fn test_static_provider_unknown_token_is_no_user() {
        let provider = StaticIdentityProvider::default().with_user("tok-1", "user-1");

        assert_eq!(provider.resolve_user(Some("other")).await.unwrap(), None);
        assert_eq!(provider.resolve_user(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rest_provider_skips_request_without_token() {
        // No token means no user; the provider must not need a reachable
        // auth service to answer.
        let provider = RestIdentityProvider::new("http://127.0.0.1:1", "key");
        assert_eq!(provider.resolve_user(None).await.unwrap(), None);
    }
}
