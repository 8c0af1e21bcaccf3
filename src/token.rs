use std::convert::TryFrom;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use crate::authenticator::{AuthenticateError, TokenRetrievalResponse};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

pub type AccessToken = String;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(from = "String", into = "String")]
pub enum TokenType {
    Bearer,
    Other(String),
}

impl From<String> for TokenType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Bearer" | "bearer" => TokenType::Bearer,
            _ => TokenType::Other(value),
        }
    }
}

impl From<TokenType> for String {
    fn from(value: TokenType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Bearer => write!(f, "Bearer"),
            TokenType::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Access token returned by the token endpoint.
///
/// The expiration is informational: tokens are replaced when the API rejects them, never ahead of
/// time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Token {
    access_token: AccessToken,
    token_type: TokenType,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

impl Token {
    pub fn new(access_token: AccessToken, token_type: TokenType) -> Self {
        Token {
            access_token,
            token_type,
            expires_at: None,
            scope: None,
        }
    }

    pub fn with_expires_at(self, expires_at: DateTime<Utc>) -> Self {
        Self {
            expires_at: Some(expires_at),
            ..self
        }
    }

    pub fn with_scope(self, scope: String) -> Self {
        Self {
            scope: Some(scope),
            ..self
        }
    }

    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }

    pub fn expires_at(&self) -> Option<&DateTime<Utc>> {
        self.expires_at.as_ref()
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Value for the `Authorization` header. Resource calls always use the bearer scheme.
    pub fn bearer_header_value(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.token_type, self.access_token)
    }
}

impl TryFrom<TokenRetrievalResponse> for Token {
    type Error = AuthenticateError;

    fn try_from(response: TokenRetrievalResponse) -> Result<Self, Self::Error> {
        let Some(access_token) = response.access_token.clone().filter(|t| !t.is_empty()) else {
            return Err(AuthenticateError::MissingAccessToken(
                serde_json::to_string(&response).unwrap_or_default(),
            ));
        };
        let token_type = response
            .token_type
            .map(TokenType::from)
            .unwrap_or(TokenType::Bearer);

        let mut token = Token::new(access_token, token_type);

        // `expires_in` is in seconds. An expiry that does not fit a timestamp is dropped.
        let expires_at = response
            .expires_in
            .and_then(|secs| TimeDelta::from_std(Duration::from_secs(secs)).ok())
            .and_then(|delta| Utc::now().checked_add_signed(delta));
        if let Some(expires_at) = expires_at {
            token = token.with_expires_at(expires_at);
        }

        if let Some(scope) = response.scope {
            token = token.with_scope(scope);
        }

        Ok(token)
    }
}

/// Shared storage for the last fetched token.
#[derive(Debug, Default)]
pub struct TokenSlot(Mutex<Option<Token>>);

impl TokenSlot {
    pub fn get(&self) -> Result<Option<Token>, SlotPoisoned> {
        self.0.lock().map(|t| t.clone()).map_err(|_| SlotPoisoned)
    }

    /// Replaces the stored token. The last writer wins.
    pub fn set(&self, token: Token) -> Result<(), SlotPoisoned> {
        let mut slot = self.0.lock().map_err(|_| SlotPoisoned)?;
        *slot = Some(token);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SlotPoisoned> {
        let mut slot = self.0.lock().map_err(|_| SlotPoisoned)?;
        *slot = None;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("acquiring token slot lock")]
pub struct SlotPoisoned;

#[cfg(test)]
mod test {
    use crate::{
        authenticator::{AuthenticateError, TokenRetrievalResponse},
        token::{Token, TokenSlot, TokenType},
    };
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    fn response(access_token: Option<&str>) -> TokenRetrievalResponse {
        TokenRetrievalResponse {
            access_token: access_token.map(String::from),
            token_type: Some("bearer".to_string()),
            expires_in: Some(3600),
            scope: None,
        }
    }

    #[test]
    fn token_from_response() {
        let token = Token::try_from(response(Some("goodtoken"))).unwrap();

        assert_eq!(token.access_token(), "goodtoken");
        assert_eq!(token.token_type(), &TokenType::Bearer);
        assert_eq!(token.bearer_header_value(), "Bearer goodtoken");
        let expires_at = *token.expires_at().unwrap();
        assert!(expires_at > Utc::now() + Duration::seconds(3590));
        assert!(token.scope().is_none());
    }

    #[test]
    fn token_without_expiration_or_type() {
        let token = Token::try_from(TokenRetrievalResponse {
            access_token: Some("t".to_string()),
            token_type: None,
            expires_in: None,
            scope: Some("read".to_string()),
        })
        .unwrap();

        assert_eq!(token.token_type(), &TokenType::Bearer);
        assert!(token.expires_at().is_none());
        assert_eq!(token.scope(), Some("read"));
    }

    #[test]
    fn token_retrieval_response_without_access_token() {
        assert_matches!(
            Token::try_from(response(None)),
            Err(AuthenticateError::MissingAccessToken(body)) => {
                assert_eq!(
                    serde_json::from_str::<serde_json::Value>(&body).unwrap(),
                    serde_json::json!({
                        "access_token": null,
                        "expires_in": 3600,
                        "token_type": "bearer",
                        "scope": null
                    })
                )
            }
        );
        assert_matches!(
            Token::try_from(response(Some(""))),
            Err(AuthenticateError::MissingAccessToken(_))
        );
    }

    #[test]
    fn out_of_range_expiration_is_dropped() {
        let token = Token::try_from(TokenRetrievalResponse {
            expires_in: Some(u64::MAX),
            ..response(Some("some-token"))
        })
        .unwrap();

        assert_eq!(token.access_token(), "some-token");
        assert!(token.expires_at().is_none());
    }

    #[test]
    fn token_type_keeps_unknown_values() {
        assert_eq!(TokenType::from("Bearer".to_string()), TokenType::Bearer);
        assert_eq!(
            TokenType::from("mac".to_string()),
            TokenType::Other("mac".to_string())
        );
        let token = Token::new("abc".to_string(), TokenType::Other("mac".to_string()));
        assert_eq!(token.to_string(), "mac abc");
        assert_eq!(
            serde_json::to_value(&token).unwrap(),
            serde_json::json!({"access_token": "abc", "token_type": "mac"})
        );
    }

    #[test]
    fn slot_keeps_the_last_token() {
        let slot = TokenSlot::default();
        assert!(slot.get().unwrap().is_none());

        slot.set(Token::new("first".to_string(), TokenType::Bearer))
            .unwrap();
        slot.set(Token::new("second".to_string(), TokenType::Bearer))
            .unwrap();
        assert_eq!(slot.get().unwrap().unwrap().access_token(), "second");

        slot.clear().unwrap();
        assert!(slot.get().unwrap().is_none());
    }
}
