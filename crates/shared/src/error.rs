use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed telemetry payload: {0}")]
    MalformedTelemetry(#[source] serde_json::Error),
    #[error("telemetry frame is not valid UTF-8")]
    NonUtf8Frame,
    #[error("failed to encode control input: {0}")]
    Encode(#[source] serde_json::Error),
}
