use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::error::Result;
use crate::platform::{Connector, FrameSink, FrameSource, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens realtime sessions over WebSocket.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, endpoint: &str) -> Result<Transport> {
        let (stream, _response) = connect_async(endpoint).await?;
        info!("WebSocket connected");
        let (sink, source) = stream.split();
        Ok(Transport {
            source: Box::new(WebSocketSource { inner: source }),
            sink: Box::new(WebSocketSink { inner: sink }),
        })
    }
}

struct WebSocketSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn next_frame(&mut self) -> Result<Option<String>> {
        loop {
            match self.inner.next().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(Some(text.to_string())),
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!("WebSocket closed by server: {:?}", frame);
                    return Ok(None);
                }
                // Pings are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }
}

struct WebSocketSink {
    inner: SplitSink<WsStream, WsMessage>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_frame(&mut self, frame: String) -> Result<()> {
        self.inner.send(WsMessage::Text(frame.into())).await?;
        Ok(())
    }
}
