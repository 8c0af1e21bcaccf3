use http::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::authenticator::{
    AuthenticateError, Authenticator, HttpAuthenticator, TokenRetrievalRequest,
};
use crate::config::{ClientConfig, ConfigOverrides, ConfigurationError, ResolvedConfig};
use crate::http_client::HttpClient;
use crate::request::{PreparedRequest, RequestError, RequestOptions, filter_response};
use crate::retry::RetryPolicy;
use crate::token::{SlotPoisoned, Token, TokenSlot, TokenType};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthenticateError),
    #[error("resource error: Status code: `{status}`, Body: `{body}`")]
    Resource { status: u16, body: String },
    #[error("access token rejected after {refreshes} refresh(es): `{body}`")]
    ExpiredToken { refreshes: u8, body: String },
    #[error("http transport error: `{0}`")]
    Transport(String),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("acquiring token slot lock")]
    PoisonError,
}

impl From<SlotPoisoned> for ApiError {
    fn from(_: SlotPoisoned) -> Self {
        ApiError::PoisonError
    }
}

impl ApiError {
    /// Raw payload returned by the server for this failure, if any.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            ApiError::Authentication(err) => err.response_body(),
            ApiError::Resource { body, .. } | ApiError::ExpiredToken { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Client for the TOL API.
///
/// Every resource call carries a bearer token obtained with the client credentials grant. When the
/// API answers 401 the token is fetched again and the call re-issued, as many times as the
/// [`RetryPolicy`] allows (once by default).
pub struct ApiClient<A, C> {
    config: ClientConfig,
    authenticator: A,
    http_client: C,
    retry_policy: RetryPolicy,
    token: TokenSlot,
}

impl<C> ApiClient<HttpAuthenticator<C>, C>
where
    C: HttpClient + Clone,
{
    /// Builds a client that uses `http_client` for both the token endpoint and the resources.
    pub fn with_http_client(config: ClientConfig, http_client: C) -> Self {
        Self::new(
            config,
            HttpAuthenticator::new(http_client.clone()),
            http_client,
        )
    }
}

impl<A, C> ApiClient<A, C>
where
    A: Authenticator,
    C: HttpClient,
{
    pub fn new(config: ClientConfig, authenticator: A, http_client: C) -> Self {
        Self {
            config,
            authenticator,
            http_client,
            retry_policy: RetryPolicy::default(),
            token: Default::default(),
        }
    }

    pub fn with_retry_policy(self, retry_policy: RetryPolicy) -> Self {
        Self {
            retry_policy,
            ..self
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Last token obtained by this client, if any.
    pub fn access_token(&self) -> Result<Option<Token>, ApiError> {
        Ok(self.token.get()?)
    }

    /// Forgets the cached token.
    pub fn clear_token(&self) -> Result<(), ApiError> {
        Ok(self.token.clear()?)
    }

    /// Exchanges the client credentials for an access token.
    ///
    /// The token is stored in the client, replacing any previous one, and returned. Fails without
    /// any network call when the endpoint or the credentials are missing.
    pub fn fetch_access_token(&self, overrides: &ConfigOverrides) -> Result<Token, ApiError> {
        let config = self.config.resolve(overrides);
        self.fetch_with(&config)
    }

    /// Calls `{base_url}/v{api_version}/{path}` with a bearer token and returns the decoded body,
    /// or `None` when the API answers with no content.
    pub fn request(&self, options: RequestOptions) -> Result<Option<Value>, ApiError> {
        let config = self.config.resolve(&options.overrides);
        let endpoint = config.resource_endpoint(options.path.as_deref())?;
        let prepared = options.prepare(endpoint)?;

        let mut token = match self.initial_token(&config)? {
            Some(token) => token,
            None => self.fetch_with(&config)?,
        };

        let mut refreshes = 0;
        loop {
            debug!("{} {}", prepared.method(), prepared.uri());
            let response = self.dispatch(&prepared, &token)?;
            let status = response.status();
            let body = response.into_body();

            if status.is_success() {
                return Ok(filter_response(prepared.data_type(), &body)?);
            }

            let body = String::from_utf8_lossy(&body).to_string();
            if status != StatusCode::UNAUTHORIZED {
                return Err(ApiError::Resource {
                    status: status.as_u16(),
                    body,
                });
            }

            if !self.retry_policy.should_refresh(refreshes) {
                warn!(
                    "access token rejected by {}, no refreshes left",
                    prepared.uri()
                );
                return Err(ApiError::ExpiredToken { refreshes, body });
            }

            warn!("access token rejected by {}, refreshing", prepared.uri());
            refreshes += 1;
            token = self.fetch_with(&config)?;
        }
    }

    /// Token to use on the first dispatch, when no fetch is needed.
    fn initial_token(&self, config: &ResolvedConfig) -> Result<Option<Token>, ApiError> {
        if let Some(access_token) = config.access_token() {
            return Ok(Some(Token::new(access_token.to_owned(), TokenType::Bearer)));
        }
        if self.config.reuse_cached_token {
            return Ok(self.token.get()?);
        }
        Ok(None)
    }

    fn fetch_with(&self, config: &ResolvedConfig) -> Result<Token, ApiError> {
        let (endpoint, client_id, client_secret) = config.token_endpoint()?;

        debug!("fetching access token from {endpoint}");
        let request =
            TokenRetrievalRequest::client_credentials(client_id.to_owned(), client_secret.to_owned());
        let response = self.authenticator.authenticate(&endpoint, request)?;
        let token = Token::try_from(response)?;

        self.token.set(token.clone())?;
        debug!("access token refreshed");

        Ok(token)
    }

    fn dispatch(
        &self,
        prepared: &PreparedRequest,
        token: &Token,
    ) -> Result<http::Response<Vec<u8>>, ApiError> {
        let request = prepared.authorized(token)?;
        self.http_client
            .send(request)
            .map_err(|e| ApiError::Transport(e.to_string()))
    }
}
