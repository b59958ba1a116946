use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("server_url must start with http:// or https://")]
    InvalidServerUrl,
    #[error("panel channel already started")]
    AlreadyConnected,
    #[error("failed to connect websocket: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),
}
