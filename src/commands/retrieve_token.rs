use crate::api_client::{ApiClient, ApiError};
use crate::authenticator::Authenticator;
use crate::config::ConfigOverrides;
use crate::http_client::HttpClient;
use crate::parameters::OutPutTokenFormat;

#[derive(thiserror::Error, Debug)]
pub enum RetrieveTokenError {
    #[error("retrieving token: `{0}`")]
    Api(#[from] ApiError),
    #[error("encoding token: `{0}`")]
    Encode(#[from] serde_json::Error),
}

pub struct RetrieveTokenCommand<A, C>
where
    A: Authenticator,
    C: HttpClient,
{
    client: ApiClient<A, C>,
}

impl<A, C> RetrieveTokenCommand<A, C>
where
    A: Authenticator,
    C: HttpClient,
{
    pub fn new(client: ApiClient<A, C>) -> Self {
        Self { client }
    }

    /// Fetches a token and renders it in the requested format.
    pub fn retrieve_token(self, format: &OutPutTokenFormat) -> Result<String, RetrieveTokenError> {
        let token = self.client.fetch_access_token(&ConfigOverrides::default())?;

        match format {
            OutPutTokenFormat::Plain => Ok(token.access_token().to_owned()),
            OutPutTokenFormat::Json => Ok(serde_json::to_string_pretty(&token)?),
        }
    }
}
