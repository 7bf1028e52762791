pub mod slack;
pub mod websocket;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::message::Attachment;

/// Result of bootstrapping a realtime session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Transport endpoint to connect to
    pub endpoint: String,
    /// The bot's own user id
    pub self_id: String,
}

/// Resolves a realtime endpoint and the bot's identity.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve_session(&self) -> Result<SessionInfo>;
}

/// Posts a message with optional attachments outside the realtime channel.
#[async_trait]
pub trait RichPoster: Send + Sync {
    async fn post_rich_message(
        &self,
        channel: &str,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<()>;
}

/// Read half of a realtime connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Next text frame, or `None` once the remote closed the connection.
    async fn next_frame(&mut self) -> Result<Option<String>>;
}

/// Write half of a realtime connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: String) -> Result<()>;
}

/// An open duplex connection split into its two halves.
pub struct Transport {
    pub source: Box<dyn FrameSource>,
    pub sink: Box<dyn FrameSink>,
}

/// Opens realtime connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Transport>;
}
