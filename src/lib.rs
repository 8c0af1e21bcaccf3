//! Client for the TOL API.
//!
//! Requests are authenticated with bearer tokens obtained through the OAuth2 client credentials
//! grant. See [`api_client::ApiClient`].

pub mod api_client;
pub mod authenticator;
pub mod commands;
pub mod config;
pub mod http;
pub mod http_client;
pub mod parameters;
pub mod request;
pub mod retry;
pub mod token;

pub type ClientID = String;
