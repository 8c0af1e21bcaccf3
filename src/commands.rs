pub mod request;
pub mod retrieve_token;
