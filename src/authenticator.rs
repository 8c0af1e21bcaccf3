use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Request, Response, Uri};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ClientID;
use crate::config::ClientSecret;
use crate::http_client::HttpClient;
use crate::token::AccessToken;

pub(crate) const APPLICATION_JSON: &str = "application/json";
pub(crate) const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

#[derive(Error, Debug)]
pub enum AuthenticateError {
    #[error("unable to serialize request: `{0}`")]
    SerializeError(String),
    #[error("unable to deserialize token: `{0}`")]
    DeserializeError(String),
    #[error("token response without access token: `{0}`")]
    MissingAccessToken(String),
    #[error("token server error: Status code: `{0}`, Reason: `{1}`")]
    HttpResponseError(u16, String),
    #[error("http transport error: `{0}`")]
    HttpTransportError(String),
}

impl AuthenticateError {
    /// Raw payload sent by the token endpoint, if the error comes from its response.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            AuthenticateError::MissingAccessToken(body)
            | AuthenticateError::HttpResponseError(_, body) => Some(body),
            _ => None,
        }
    }
}

pub trait Authenticator {
    fn authenticate(
        &self,
        endpoint: &Uri,
        req: TokenRetrievalRequest,
    ) -> Result<TokenRetrievalResponse, AuthenticateError>;
}

/// Exchanges client credentials for an access token at the API token endpoint.
pub struct HttpAuthenticator<C> {
    /// HTTP client
    http_client: C,
}

impl<C> HttpAuthenticator<C> {
    pub fn new(http_client: C) -> Self {
        Self { http_client }
    }
}

impl<C> Authenticator for HttpAuthenticator<C>
where
    C: HttpClient,
{
    /// Executes a form encoded POST request to `endpoint` and returns the decoded token response.
    fn authenticate(
        &self,
        endpoint: &Uri,
        req: TokenRetrievalRequest,
    ) -> Result<TokenRetrievalResponse, AuthenticateError> {
        let request = build_request(endpoint, &req)?;

        let response = self
            .http_client
            .send(request)
            .map_err(|e| AuthenticateError::HttpTransportError(e.to_string()))?;

        evaluate_response(response)
    }
}

fn build_request(
    endpoint: &Uri,
    req: &TokenRetrievalRequest,
) -> Result<Request<Vec<u8>>, AuthenticateError> {
    let body = serde_urlencoded::to_string(req)
        .map_err(|e| AuthenticateError::SerializeError(e.to_string()))?;

    Request::builder()
        .uri(endpoint)
        .method("POST")
        .header(CONTENT_TYPE, FORM_URLENCODED)
        .header(ACCEPT, APPLICATION_JSON)
        .body(body.into_bytes())
        .map_err(|e| AuthenticateError::SerializeError(format!("Failed to build request: {e}")))
}

fn evaluate_response(
    response: Response<Vec<u8>>,
) -> Result<TokenRetrievalResponse, AuthenticateError> {
    let body = String::from_utf8(response.body().clone()).map_err(|e| {
        AuthenticateError::DeserializeError(format!("invalid utf8 response: {}", e))
    })?;

    if !response.status().is_success() {
        return Err(AuthenticateError::HttpResponseError(
            response.status().as_u16(),
            body,
        ));
    }

    let decoded: TokenRetrievalResponse = serde_json::from_str(body.as_str())
        .map_err(|e| AuthenticateError::DeserializeError(e.to_string()))?;

    if decoded.access_token.as_deref().is_none_or(str::is_empty) {
        return Err(AuthenticateError::MissingAccessToken(body));
    }

    Ok(decoded)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    ClientCredentials,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRetrievalRequest {
    pub grant_type: GrantType,
    pub client_id: ClientID,
    pub client_secret: ClientSecret,
}

impl TokenRetrievalRequest {
    pub fn client_credentials(client_id: ClientID, client_secret: ClientSecret) -> Self {
        Self {
            grant_type: GrantType::ClientCredentials,
            client_id,
            client_secret,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TokenRetrievalResponse {
    pub access_token: Option<AccessToken>,
    /// The lifetime in seconds of the access token. Values that are not a non-negative number or
    /// numeric string are ignored.
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(seconds)
}
