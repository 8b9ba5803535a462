use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use shared::protocol::{OutboundMessage, ServerEvent};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::warn;

/// Lifecycle of the single logical relay link. Owned exclusively by the
/// reconnection supervisor; everyone else only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Open,
    ClosedPendingRetry,
}

/// Outbound half of a live channel. Sends are fire-and-forget: an error
/// means the frame never left this process, nothing more. The relay
/// provides no delivery acknowledgement at this layer.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<()>;
}

/// Inbound half of a live channel. `next_event` yields relay events in
/// the order the relay sent them and returns `None` once the channel is
/// closed. Unparseable frames are dropped here, never surfaced.
#[async_trait]
pub trait ChannelEvents: Send {
    async fn next_event(&mut self) -> Option<ServerEvent>;
}

/// Seam for establishing transport channels, so tests can inject a
/// scripted transport in place of a real websocket.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(
        &self,
        ws_url: &str,
    ) -> Result<(Arc<dyn ChannelSender>, Box<dyn ChannelEvents>)>;
}

/// Production connector over tokio-tungstenite.
pub struct WsConnector;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct WsSender {
    sink: Mutex<SplitSink<WsStream, Message>>,
}

#[async_trait]
impl ChannelSender for WsSender {
    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let frame = serde_json::to_string(&message).context("serialize outbound message")?;
        self.sink
            .lock()
            .await
            .send(Message::Text(frame))
            .await
            .context("websocket send failed")?;
        Ok(())
    }
}

struct WsEvents {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl ChannelEvents for WsEvents {
    async fn next_event(&mut self) -> Option<ServerEvent> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => return Some(event),
                    Err(err) => {
                        warn!("link: dropping malformed relay event: {err}");
                    }
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(err) => {
                    warn!("link: websocket receive failed: {err}");
                    return None;
                }
            }
        }
        None
    }
}

#[async_trait]
impl ChannelConnector for WsConnector {
    async fn connect(
        &self,
        ws_url: &str,
    ) -> Result<(Arc<dyn ChannelSender>, Box<dyn ChannelEvents>)> {
        let (ws_stream, _) = connect_async(ws_url)
            .await
            .with_context(|| format!("failed to connect websocket: {ws_url}"))?;
        let (sink, stream) = ws_stream.split();
        Ok((
            Arc::new(WsSender {
                sink: Mutex::new(sink),
            }),
            Box::new(WsEvents { stream }),
        ))
    }
}
