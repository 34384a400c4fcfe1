//! Process configuration, loaded from the environment once at startup.

use std::env;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The completion credential is required at process start.
    #[error("{0} is not set")]
    MissingVar(&'static str),
    #[error("{0} is set but its companion {1} is not")]
    IncompleteEndpoint(&'static str, &'static str),
    #[error("invalid PORT value: {0}")]
    InvalidPort(String),
}

/// A REST service base URL plus its service key.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    pub url: String,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Default completion service credential. A request's preview token
    /// overrides it for that request only.
    pub openai_api_key: String,
    /// Identity provider endpoint. When absent every session is treated as
    /// unauthenticated.
    pub auth: Option<ServiceEndpoint>,
    /// Chat store endpoint. When absent transcripts go to the in-memory
    /// store.
    pub database: Option<ServiceEndpoint>,
    /// Name of the cookie carrying the session token.
    pub session_cookie: String,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let openai_api_key =
            lookup("OPENAI_API_KEY").ok_or(ConfigError::MissingVar("OPENAI_API_KEY"))?;

        let auth = endpoint(&lookup, "AUTH_URL", "AUTH_SERVICE_KEY")?;
        let database = endpoint(&lookup, "DATABASE_URL", "DATABASE_SERVICE_KEY")?;

        let session_cookie =
            lookup("SESSION_COOKIE").unwrap_or_else(|| "sb-access-token".to_string());
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => 8080,
        };

        Ok(Self {
            openai_api_key,
            auth,
            database,
            session_cookie,
            host,
            port,
        })
    }
}

fn endpoint(
    lookup: impl Fn(&str) -> Option<String>,
    url_var: &'static str,
    key_var: &'static str,
) -> Result<Option<ServiceEndpoint>, ConfigError> {
    match (lookup(url_var), lookup(key_var)) {
        (Some(url), Some(key)) => Ok(Some(ServiceEndpoint { url, key })),
        (Some(_), None) => Err(ConfigError::IncompleteEndpoint(url_var, key_var)),
        (None, _) => Ok(None),
    }
}
