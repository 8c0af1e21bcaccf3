use serde_json::Value;

use crate::api_client::{ApiClient, ApiError};
use crate::authenticator::Authenticator;
use crate::http_client::HttpClient;
use crate::request::RequestOptions;

#[derive(thiserror::Error, Debug)]
pub enum RequestCommandError {
    #[error("request failed: `{0}`")]
    Api(#[from] ApiError),
    #[error("encoding response: `{0}`")]
    Encode(#[from] serde_json::Error),
}

pub struct RequestCommand<A, C>
where
    A: Authenticator,
    C: HttpClient,
{
    client: ApiClient<A, C>,
}

impl<A, C> RequestCommand<A, C>
where
    A: Authenticator,
    C: HttpClient,
{
    pub fn new(client: ApiClient<A, C>) -> Self {
        Self { client }
    }

    /// Runs the request and renders the response: JSON pretty printed, text as-is, nothing for
    /// an empty response.
    pub fn request(self, options: RequestOptions) -> Result<String, RequestCommandError> {
        match self.client.request(options)? {
            None => Ok(String::new()),
            Some(Value::String(text)) => Ok(text),
            Some(value) => Ok(serde_json::to_string_pretty(&value)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rstest::rstest;

    use super::*;
    use crate::authenticator::HttpAuthenticator;
    use crate::config::{ClientConfig, ClientSecret};
    use crate::http_client::tests::{MockHttpClient, response};
    use crate::request::DataType;

    fn command(
        resource_status: u16,
        resource_body: &'static str,
    ) -> RequestCommand<HttpAuthenticator<MockHttpClient>, MockHttpClient> {
        let mut token_http_client = MockHttpClient::new();
        token_http_client
            .expect_send()
            .once()
            .returning(|_| Ok(response(200, r#"{"access_token":"goodtoken"}"#)));
        let mut resource_http_client = MockHttpClient::new();
        resource_http_client
            .expect_send()
            .once()
            .returning(move |_| Ok(response(resource_status, resource_body)));

        let config = ClientConfig::new("test".to_string(), ClientSecret::from("test"));
        RequestCommand::new(ApiClient::new(
            config,
            HttpAuthenticator::new(token_http_client),
            resource_http_client,
        ))
    }

    #[rstest]
    #[case(DataType::Json, r#"{"key":"value"}"#, "{\n  \"key\": \"value\"\n}")]
    #[case(DataType::Json, "", "")]
    #[case(DataType::Text, "plain text", "plain text")]
    fn renders_response(
        #[case] data_type: DataType,
        #[case] body: &'static str,
        #[case] expected: &str,
    ) {
        let output = command(200, body)
            .request(RequestOptions::new("foo").with_data_type(data_type))
            .unwrap();

        assert_eq!(output, expected);
    }

    #[test]
    fn resource_error() {
        let result =
            command(404, r#"{"error":{"message":"404"}}"#).request(RequestOptions::new("foo"));

        assert_matches!(
            result,
            Err(RequestCommandError::Api(ApiError::Resource { status: 404, .. }))
        );
    }
}
