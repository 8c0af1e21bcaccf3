use http::Uri;
use std::env;
use std::env::VarError;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CONN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub(crate) timeout: Duration,
    pub(crate) conn_timeout: Duration,
    pub(crate) proxy: ProxyConfig,
}

impl HttpConfig {
    pub fn new(timeout: Duration, conn_timeout: Duration, proxy: ProxyConfig) -> Self {
        Self {
            timeout,
            conn_timeout,
            proxy,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_CONN_TIMEOUT, ProxyConfig::default())
    }
}

/// Environment variables checked, in order, when no proxy is configured.
const PROXY_ENV_NAMES: [&str; 2] = ["HTTPS_PROXY", "HTTP_PROXY"];

#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    #[error("invalid proxy url `{0}`: `{1}`")]
    InvalidUrl(String, String),
}

/// Proxy for the API HTTP client, `<protocol>://<user>:<password>@<host>:<port>`. No proxy is
/// used when unset.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct ProxyConfig {
    url: Option<Uri>,
}

impl ProxyConfig {
    /// Parses `proxy_url`. An empty string means no proxy.
    pub fn new(proxy_url: &str) -> Result<Self, ProxyError> {
        if proxy_url.is_empty() {
            return Ok(Self::default());
        }
        let url = proxy_url
            .parse::<Uri>()
            .map_err(|err| ProxyError::InvalidUrl(proxy_url.to_string(), err.to_string()))?;
        Ok(Self { url: Some(url) })
    }

    pub(crate) fn url(&self) -> Option<&Uri> {
        self.url.as_ref()
    }

    /// Falls back to `HTTPS_PROXY`, then `HTTP_PROXY`, when no proxy url is set.
    pub fn try_with_url_from_env(self) -> Result<Self, ProxyError> {
        self.or_env_proxy(env::var)
    }

    fn or_env_proxy<F>(self, env_var: F) -> Result<Self, ProxyError>
    where
        F: Fn(&'static str) -> Result<String, VarError>,
    {
        if self.url.is_some() {
            return Ok(self);
        }
        match PROXY_ENV_NAMES.into_iter().find_map(|name| env_var(name).ok()) {
            Some(url) => Self::new(&url),
            None => Ok(self),
        }
    }
}
