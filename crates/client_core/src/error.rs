use shared::error::ProtocolError;
use thiserror::Error;

/// Why a control input did not leave the client. Callers are expected to
/// drop it and try again on the next state change.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("simulator connection is not open")]
    NotConnected,
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid simulator endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        source: url::ParseError,
    },
    #[error("simulator endpoint must use ws:// or wss://, got '{0}'")]
    UnsupportedScheme(String),
}
