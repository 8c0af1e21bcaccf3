use std::env;
use std::env::VarError;
use std::fmt;

use http::Uri;
use serde::{Deserialize, Serialize};

use crate::ClientID;
use crate::token::AccessToken;

pub const DEFAULT_BASE_URL: &str = "https://apis.traderonline.com";
pub const DEFAULT_API_VERSION: &str = "1";

const BASE_URL_ENV_NAME: &str = "TOL_BASE_URL";
const API_VERSION_ENV_NAME: &str = "TOL_API_VERSION";
const CLIENT_ID_ENV_NAME: &str = "TOL_CLIENT_ID";
const CLIENT_SECRET_ENV_NAME: &str = "TOL_CLIENT_SECRET";

const TOKEN_PATH: &str = "token";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigurationError {
    #[error("missing required fields for getting an access token: {0}")]
    MissingTokenFields(String),
    #[error("missing required parameters: {0}")]
    MissingRequestFields(String),
    #[error("invalid endpoint `{0}`: `{1}`")]
    InvalidEndpoint(String, String),
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSecret(String);

impl<S: AsRef<str>> From<S> for ClientSecret {
    fn from(secret: S) -> Self {
        ClientSecret(secret.as_ref().to_string())
    }
}

impl ClientSecret {
    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientSecret: redacted")
    }
}

/// Default settings of an [`ApiClient`](crate::api_client::ApiClient).
///
/// Every field can be overridden per call through [`ConfigOverrides`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: Option<String>,
    pub api_version: Option<String>,
    pub client_id: Option<ClientID>,
    pub client_secret: Option<ClientSecret>,
    /// Use the token cached by a previous fetch instead of fetching a new one for every request.
    pub reuse_cached_token: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            api_version: Some(DEFAULT_API_VERSION.to_string()),
            client_id: None,
            client_secret: None,
            reuse_cached_token: false,
        }
    }
}

impl ClientConfig {
    pub fn new(client_id: ClientID, client_secret: ClientSecret) -> Self {
        Self {
            client_id: Some(client_id),
            client_secret: Some(client_secret),
            ..Default::default()
        }
    }

    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..self
        }
    }

    pub fn with_api_version(self, api_version: impl Into<String>) -> Self {
        Self {
            api_version: Some(api_version.into()),
            ..self
        }
    }

    pub fn with_reuse_cached_token(self, reuse_cached_token: bool) -> Self {
        Self {
            reuse_cached_token,
            ..self
        }
    }

    /// Returns a new instance whose missing fields are taken from the `TOL_*` environment variables.
    pub fn with_env(self) -> Self {
        self.with_env_values(env::var)
    }

    /// Fills the missing fields using the provided `env_var` function. Values already set have
    /// priority over the environment.
    fn with_env_values<F>(self, env_var: F) -> Self
    where
        F: Fn(&'static str) -> Result<String, VarError>,
    {
        let from_env = |current: Option<String>, name| current.or_else(|| env_var(name).ok());
        Self {
            base_url: from_env(self.base_url, BASE_URL_ENV_NAME),
            api_version: from_env(self.api_version, API_VERSION_ENV_NAME),
            client_id: from_env(self.client_id, CLIENT_ID_ENV_NAME),
            client_secret: self
                .client_secret
                .or_else(|| env_var(CLIENT_SECRET_ENV_NAME).ok().map(ClientSecret::from)),
            reuse_cached_token: self.reuse_cached_token,
        }
    }

    /// Sets the public API root and version where they are still missing.
    pub fn with_defaults(self) -> Self {
        Self {
            base_url: self.base_url.or_else(|| Some(DEFAULT_BASE_URL.to_string())),
            api_version: self
                .api_version
                .or_else(|| Some(DEFAULT_API_VERSION.to_string())),
            ..self
        }
    }

    /// Layers `overrides` on top of these defaults. Call-level values take precedence.
    pub fn resolve(&self, overrides: &ConfigOverrides) -> ResolvedConfig {
        ResolvedConfig {
            base_url: overrides.base_url.clone().or_else(|| self.base_url.clone()),
            api_version: overrides
                .api_version
                .clone()
                .or_else(|| self.api_version.clone()),
            client_id: overrides.client_id.clone().or_else(|| self.client_id.clone()),
            client_secret: overrides
                .client_secret
                .clone()
                .or_else(|| self.client_secret.clone()),
            access_token: overrides.access_token.clone(),
        }
    }
}

/// Per-call overrides of the [`ClientConfig`] defaults.
#[derive(Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub api_version: Option<String>,
    pub client_id: Option<ClientID>,
    pub client_secret: Option<ClientSecret>,
    /// Token to use for this call, skipping the token fetch.
    pub access_token: Option<AccessToken>,
}

impl fmt::Debug for ConfigOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOverrides")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret)
            .field("access_token", &redacted(&self.access_token))
            .finish()
    }
}

/// Configuration of a single call, after applying the overrides.
#[derive(Clone, PartialEq)]
pub struct ResolvedConfig {
    base_url: Option<String>,
    api_version: Option<String>,
    client_id: Option<ClientID>,
    client_secret: Option<ClientSecret>,
    access_token: Option<AccessToken>,
}

impl ResolvedConfig {
    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref().filter(|t| !t.is_empty())
    }

    /// Returns the credentials and the token endpoint, or the list of missing fields.
    pub fn token_endpoint(&self) -> Result<(Uri, &str, &ClientSecret), ConfigurationError> {
        let base_url = present(&self.base_url);
        let api_version = present(&self.api_version);
        let client_id = present(&self.client_id);
        let client_secret = self.client_secret.as_ref().filter(|s| !s.is_empty());

        match (base_url, api_version, client_id, client_secret) {
            (Some(base_url), Some(api_version), Some(client_id), Some(client_secret)) => {
                let uri = build_uri(base_url, api_version, TOKEN_PATH)?;
                Ok((uri, client_id, client_secret))
            }
            _ => Err(ConfigurationError::MissingTokenFields(missing_fields(&[
                ("base_url", base_url.is_none()),
                ("api_version", api_version.is_none()),
                ("client_id", client_id.is_none()),
                ("client_secret", client_secret.is_none()),
            ]))),
        }
    }

    /// Builds `{base_url}/v{api_version}/{path}`.
    pub fn resource_endpoint(&self, path: Option<&str>) -> Result<Uri, ConfigurationError> {
        let base_url = present(&self.base_url);
        let api_version = present(&self.api_version);
        let path = path.filter(|p| !p.is_empty());

        match (base_url, api_version, path) {
            (Some(base_url), Some(api_version), Some(path)) => {
                build_uri(base_url, api_version, path)
            }
            _ => Err(ConfigurationError::MissingRequestFields(missing_fields(&[
                ("base_url", base_url.is_none()),
                ("api_version", api_version.is_none()),
                ("path", path.is_none()),
            ]))),
        }
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret)
            .field("access_token", &redacted(&self.access_token))
            .finish()
    }
}

fn redacted(token: &Option<AccessToken>) -> Option<&'static str> {
    token.as_ref().map(|_| "redacted")
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn missing_fields(fields: &[(&str, bool)]) -> String {
    fields
        .iter()
        .filter(|(_, missing)| *missing)
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn build_uri(base_url: &str, api_version: &str, path: &str) -> Result<Uri, ConfigurationError> {
    let url = format!(
        "{}/v{}/{}",
        base_url.trim_end_matches('/'),
        api_version,
        path.trim_start_matches('/')
    );
    url.parse::<Uri>()
        .map_err(|err| ConfigurationError::InvalidEndpoint(url.clone(), err.to_string()))
}
