use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("error parsing frame: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown action: {action}")]
    UnknownAction { action: String },
    #[error("invalid payload for {action}: {source}")]
    Payload {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}
