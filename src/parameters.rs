use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use http::Method;
use serde_json::Value;

use crate::config::{ClientConfig, ClientSecret, ConfigOverrides};
use crate::http::config::{DEFAULT_TIMEOUT, HttpConfig, ProxyConfig, ProxyError};
use crate::request::{DataType, RequestError, RequestOptions};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Retrieve an access token with the client credentials.
    Token {
        /// Select format how the Token should be obtained
        #[arg(long, default_value = "Plain")]
        output_token_format: OutPutTokenFormat,
    },
    /// Call an API resource with a fresh access token.
    Request(RequestArgs),
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutPutTokenFormat {
    /// Returns only the access token without type or expiration day
    #[value(name = "Plain")]
    Plain,
    /// Returns full token information in json format
    #[value(name = "Json")]
    Json,
}

/// Connection and credential settings. Values not given are read from the `TOL_*` environment
/// variables.
#[derive(Args, Debug, Clone, Default)]
pub struct ClientArgs {
    /// API root, e.g. https://apis.traderonline.com
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Version of the API to use
    #[arg(long, global = true)]
    api_version: Option<String>,

    /// ID of the client
    #[arg(long, global = true)]
    client_id: Option<String>,

    /// Client secret used to get access tokens
    #[arg(long, global = true)]
    client_secret: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Proxy URL: <protocol>://<user>:<password>@<host>:<port>
    #[arg(long, global = true)]
    proxy_url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Resource path, relative to the API version root
    #[arg(long, short)]
    path: String,

    /// HTTP method
    #[arg(long, short = 'X', default_value = "GET")]
    method: String,

    /// JSON value sent as body (query string for GET)
    #[arg(long, group = "request-body")]
    data: Option<String>,

    /// Body sent as-is
    #[arg(long, group = "request-body")]
    raw_data: Option<String>,

    /// Read the raw body from a file
    #[arg(long, group = "request-body")]
    data_file: Option<PathBuf>,

    /// Content type of the body, application/json by default for non-GET requests
    #[arg(long)]
    content_type: Option<String>,

    /// Extra header, `Name: value`. Can be repeated.
    #[arg(long = "header", short = 'H')]
    headers: Vec<String>,

    /// Use this token instead of fetching one
    #[arg(long)]
    access_token: Option<String>,

    /// Print the response body as text instead of parsing it as JSON
    #[arg(long)]
    text: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum ParametersError {
    #[error("invalid method `{0}`")]
    InvalidMethod(String),
    #[error("invalid JSON data: `{0}`")]
    InvalidData(String),
    #[error("invalid header `{0}`, expected `Name: value`")]
    InvalidHeader(String),
    #[error("reading data file: `{0}`")]
    DataFile(String),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

impl ClientArgs {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            api_version: self.api_version.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.as_ref().map(ClientSecret::from),
            reuse_cached_token: false,
        }
        .with_env()
        .with_defaults()
    }

    pub fn http_config(&self) -> Result<HttpConfig, ParametersError> {
        let timeout = self
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        let proxy = ProxyConfig::new(self.proxy_url.as_deref().unwrap_or_default())?
            .try_with_url_from_env()?;
        Ok(HttpConfig::new(timeout, timeout, proxy))
    }
}

impl RequestArgs {
    pub fn request_options(&self) -> Result<RequestOptions, ParametersError> {
        let method = Method::from_bytes(self.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| ParametersError::InvalidMethod(self.method.clone()))?;

        let mut options = RequestOptions::new(self.path.as_str()).with_method(method);

        if let Some(data) = &self.data {
            let value: Value = serde_json::from_str(data)
                .map_err(|e| ParametersError::InvalidData(e.to_string()))?;
            options = options.with_json_body(value);
        }
        if let Some(raw_data) = &self.raw_data {
            options = options.with_raw_body(raw_data.as_str());
        }
        if let Some(path) = &self.data_file {
            let raw_data = std::fs::read_to_string(path)
                .map_err(|e| ParametersError::DataFile(format!("{}: {e}", path.display())))?;
            options = options.with_raw_body(raw_data);
        }
        if let Some(content_type) = &self.content_type {
            options = options.with_content_type(content_type.as_str());
        }
        for header in &self.headers {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| ParametersError::InvalidHeader(header.clone()))?;
            options = options.with_header(name.trim(), value.trim())?;
        }
        if self.text {
            options = options.with_data_type(DataType::Text);
        }

        Ok(options.with_overrides(ConfigOverrides {
            access_token: self.access_token.clone(),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clap::Parser;
    use http::header::CONTENT_TYPE;

    use super::*;
    use crate::request::RequestBody;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        client: ClientArgs,
        #[command(subcommand)]
        command: Commands,
    }

    fn request_args(args: &[&str]) -> RequestArgs {
        let cli = TestCli::try_parse_from([&["tol-cli", "request"][..], args].concat()).unwrap();
        match cli.command {
            Commands::Request(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn put_with_json_data() {
        let options = request_args(&[
            "--path",
            "foo",
            "-X",
            "put",
            "--data",
            r#"{"foo":"bar"}"#,
            "-H",
            "X-Trace: abc",
        ])
        .request_options()
        .unwrap();

        assert_eq!(options.path.as_deref(), Some("foo"));
        assert_eq!(options.method, Method::PUT);
        assert_eq!(
            options.body,
            Some(RequestBody::Json(serde_json::json!({"foo": "bar"})))
        );
        assert_eq!(options.headers["x-trace"], "abc");
        assert_eq!(options.data_type, DataType::Json);
    }

    #[test]
    fn raw_data_and_text_output() {
        let options = request_args(&[
            "--path",
            "foo",
            "-X",
            "POST",
            "--raw-data",
            "a=1",
            "--content-type",
            "application/x-www-form-urlencoded",
            "--access-token",
            "explicit",
            "--text",
        ])
        .request_options()
        .unwrap();

        assert_eq!(options.body, Some(RequestBody::Raw("a=1".to_string())));
        assert_eq!(
            options.content_type.as_deref(),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(options.overrides.access_token.as_deref(), Some("explicit"));
        assert_eq!(options.data_type, DataType::Text);
        assert!(options.headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn data_arguments_are_exclusive() {
        let result = TestCli::try_parse_from([
            "tol-cli",
            "request",
            "--path",
            "foo",
            "--data",
            "{}",
            "--raw-data",
            "x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn invalid_values() {
        assert_matches!(
            request_args(&["--path", "foo", "--data", "{not json"]).request_options(),
            Err(ParametersError::InvalidData(_))
        );
        assert_matches!(
            request_args(&["--path", "foo", "-H", "no-colon"]).request_options(),
            Err(ParametersError::InvalidHeader(h)) => assert_eq!(h, "no-colon")
        );
        assert_matches!(
            request_args(&["--path", "foo", "-X", "GE T"]).request_options(),
            Err(ParametersError::InvalidMethod(_))
        );
        assert_matches!(
            request_args(&["--path", "foo", "--data-file", "/nonexistent/tol-body.json"])
                .request_options(),
            Err(ParametersError::DataFile(msg)) => assert!(msg.contains("tol-body.json"))
        );
    }

    #[test]
    fn data_file_is_sent_raw() {
        let path = std::env::temp_dir().join(format!("tol-cli-body-{}.txt", std::process::id()));
        std::fs::write(&path, "raw body").unwrap();

        let options = request_args(&["--path", "foo", "--data-file", path.to_str().unwrap()])
            .request_options();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            options.unwrap().body,
            Some(RequestBody::Raw("raw body".to_string()))
        );
    }

    #[test]
    fn global_client_args() {
        let cli = TestCli::try_parse_from([
            "tol-cli",
            "token",
            "--base-url",
            "https://api.example.com",
            "--client-id",
            "id",
            "--client-secret",
            "secret",
            "--timeout-secs",
            "10",
            "--proxy-url",
            "http://localhost:8888",
            "--output-token-format",
            "Json",
        ])
        .unwrap();

        assert_matches!(
            cli.command,
            Commands::Token {
                output_token_format: OutPutTokenFormat::Json
            }
        );
        let config = cli.client.client_config();
        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.client_id.as_deref(), Some("id"));
        assert_eq!(config.client_secret, Some(ClientSecret::from("secret")));

        let http_config = cli.client.http_config().unwrap();
        assert_eq!(http_config.timeout, Duration::from_secs(10));
        assert_eq!(
            http_config.proxy,
            ProxyConfig::new("http://localhost:8888").unwrap()
        );
    }
}
