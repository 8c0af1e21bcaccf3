use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri};
use serde_json::Value;
use thiserror::Error;

use crate::authenticator::{APPLICATION_JSON, FORM_URLENCODED};
use crate::config::ConfigOverrides;
use crate::token::Token;

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("invalid header `{0}`: `{1}`")]
    InvalidHeader(String, String),
    #[error("unable to encode request: `{0}`")]
    Encode(String),
    #[error("unable to decode response: `{0}`")]
    Decode(String),
}

/// How a successful response body is handed back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataType {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Structured value, encoded according to the content type.
    Json(Value),
    /// Sent as-is.
    Raw(String),
}

/// Parameters of a single API call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub path: Option<String>,
    pub method: Method,
    pub body: Option<RequestBody>,
    pub headers: HeaderMap,
    pub content_type: Option<String>,
    pub data_type: DataType,
    pub overrides: ConfigOverrides,
}

impl RequestOptions {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_method(self, method: Method) -> Self {
        Self { method, ..self }
    }

    pub fn with_json_body(self, body: Value) -> Self {
        Self {
            body: Some(RequestBody::Json(body)),
            ..self
        }
    }

    pub fn with_raw_body(self, body: impl Into<String>) -> Self {
        Self {
            body: Some(RequestBody::Raw(body.into())),
            ..self
        }
    }

    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..self
        }
    }

    pub fn with_data_type(self, data_type: DataType) -> Self {
        Self { data_type, ..self }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, RequestError> {
        let name = HeaderName::try_from(name)
            .map_err(|e| RequestError::InvalidHeader(name.to_string(), e.to_string()))?;
        let value = HeaderValue::try_from(value)
            .map_err(|e| RequestError::InvalidHeader(name.to_string(), e.to_string()))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.overrides.access_token = Some(access_token.into());
        self
    }

    pub fn with_overrides(self, overrides: ConfigOverrides) -> Self {
        Self { overrides, ..self }
    }

    /// Encodes the body and headers for `endpoint`. The result can be sent several times with
    /// different tokens.
    pub(crate) fn prepare(self, endpoint: Uri) -> Result<PreparedRequest, RequestError> {
        let mut headers = self.headers;
        let mut uri = endpoint;
        let mut body = Vec::new();

        if self.data_type == DataType::Json && !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        }

        let content_type = if self.method == Method::GET {
            if let Some(request_body) = &self.body {
                uri = with_query(&uri, &encode_query(request_body)?)?;
            }
            self.content_type
        } else {
            let content_type = self
                .content_type
                .unwrap_or_else(|| APPLICATION_JSON.to_string());
            if let Some(request_body) = &self.body {
                body = encode_body(request_body, &content_type)?;
            }
            Some(content_type)
        };

        if let Some(content_type) = content_type {
            let value = HeaderValue::try_from(content_type.as_str()).map_err(|e| {
                RequestError::InvalidHeader(CONTENT_TYPE.to_string(), e.to_string())
            })?;
            headers.insert(CONTENT_TYPE, value);
        }

        Ok(PreparedRequest {
            method: self.method,
            uri,
            headers,
            body,
            data_type: self.data_type,
        })
    }
}

/// A request ready to be dispatched once a token is known.
#[derive(Debug, Clone)]
pub(crate) struct PreparedRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Vec<u8>,
    data_type: DataType,
}

impl PreparedRequest {
    pub(crate) fn uri(&self) -> &Uri {
        &self.uri
    }

    pub(crate) fn method(&self) -> &Method {
        &self.method
    }

    pub(crate) fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Builds the HTTP request carrying `Authorization: Bearer <token>`.
    pub(crate) fn authorized(&self, token: &Token) -> Result<Request<Vec<u8>>, RequestError> {
        let mut bearer_token_header = HeaderValue::from_str(&token.bearer_header_value())
            .map_err(|e| RequestError::InvalidHeader(AUTHORIZATION.to_string(), e.to_string()))?;
        bearer_token_header.set_sensitive(true);

        let mut headers = self.headers.clone();
        headers.insert(AUTHORIZATION, bearer_token_header);

        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(self.uri.clone())
            .body(self.body.clone())
            .map_err(|e| RequestError::Encode(format!("Failed to build request: {e}")))?;
        *request.headers_mut() = headers;

        Ok(request)
    }
}

/// Turns a successful response body into the value handed to the caller. An empty body means
/// "no content" and yields `None`.
pub(crate) fn filter_response(
    data_type: DataType,
    body: &[u8],
) -> Result<Option<Value>, RequestError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| RequestError::Decode(format!("invalid utf8 response: {e}")))?;

    if text.trim().is_empty() {
        return Ok(None);
    }

    match data_type {
        DataType::Json => serde_json::from_str(text)
            .map(Some)
            .map_err(|e| RequestError::Decode(e.to_string())),
        DataType::Text => Ok(Some(Value::String(text.to_string()))),
    }
}

fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn encode_body(body: &RequestBody, content_type: &str) -> Result<Vec<u8>, RequestError> {
    match body {
        RequestBody::Raw(raw) => Ok(raw.as_bytes().to_vec()),
        RequestBody::Json(value) => match mime_essence(content_type).as_str() {
            FORM_URLENCODED => serde_urlencoded::to_string(value)
                .map(String::into_bytes)
                .map_err(|e| RequestError::Encode(e.to_string())),
            essence if essence == APPLICATION_JSON || essence.ends_with("+json") => {
                serde_json::to_vec(value).map_err(|e| RequestError::Encode(e.to_string()))
            }
            _ => Err(RequestError::Encode(format!(
                "structured body cannot be sent as `{content_type}`"
            ))),
        },
    }
}

fn encode_query(body: &RequestBody) -> Result<String, RequestError> {
    match body {
        RequestBody::Raw(raw) => Ok(raw.clone()),
        RequestBody::Json(value @ Value::Object(_)) => serde_urlencoded::to_string(value)
            .map_err(|e| RequestError::Encode(e.to_string())),
        RequestBody::Json(_) => Err(RequestError::Encode(
            "only objects can be sent as query parameters".to_string(),
        )),
    }
}

fn with_query(uri: &Uri, query: &str) -> Result<Uri, RequestError> {
    if query.is_empty() {
        return Ok(uri.clone());
    }
    let separator = if uri.query().is_some() { '&' } else { '?' };
    format!("{uri}{separator}{query}")
        .parse()
        .map_err(|e: http::uri::InvalidUri| RequestError::Encode(e.to_string()))
}
