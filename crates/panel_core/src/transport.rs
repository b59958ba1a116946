use anyhow::Result;
use async_trait::async_trait;
use futures::{stream::SplitSink, SinkExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

/// Outbound half of the panel channel. A seam so the command emitter can
/// be driven against something other than a live socket.
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, frame: String) -> Result<()>;
}

pub(crate) type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

pub struct WsTransport {
    sink: WsSink,
}

impl WsTransport {
    pub(crate) fn new(sink: WsSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, frame: String) -> Result<()> {
        self.sink.send(Message::Text(frame)).await?;
        Ok(())
    }
}
