//! Transport seam under the task status channel.
//!
//! [`WsConnector`] opens a WebSocket with `tokio-tungstenite`; tests swap in
//! scripted connectors.

use crate::shared::error::TransportError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

/// Opens one live transport to a channel URL
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Box<dyn FrameStream>, TransportError>;
}

/// A live, text-oriented duplex stream
#[async_trait]
pub trait FrameStream: Send {
    /// Next text message, or `None` once the peer closed.
    ///
    /// Must be cancel safe: it is raced against shutdown and outbound sends.
    async fn next_text(&mut self) -> Option<Result<String, TransportError>>;

    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the transport; errors are not interesting at this point
    async fn close(&mut self);
}

/// WebSocket connector
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn FrameStream>, TransportError> {
        let (ws, response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::handshake(e.to_string()))?;
        tracing::debug!(url = %url, status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WsFrameStream { ws }))
    }
}

struct WsFrameStream {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameStream for WsFrameStream {
    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Some(Err(TransportError::stream(e.to_string()))),
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.ws
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::stream(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            tracing::debug!("websocket close: {}", e);
        }
    }
}
