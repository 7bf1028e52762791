//! In-memory collaborators for driving the engine in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::message::Attachment;
use crate::platform::{
    Connector, FrameSink, FrameSource, RichPoster, SessionInfo, SessionResolver, Transport,
};

pub struct StaticResolver {
    pub info: SessionInfo,
    pub calls: AtomicUsize,
}

impl StaticResolver {
    pub fn new(self_id: &str) -> Self {
        Self {
            info: SessionInfo {
                endpoint: "memory://realtime".to_string(),
                self_id: self_id.to_string(),
            },
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SessionResolver for StaticResolver {
    async fn resolve_session(&self) -> Result<SessionInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.info.clone())
    }
}

/// Answers 503 on the listed (1-based) calls and succeeds otherwise.
pub struct FlakyResolver {
    inner: StaticResolver,
    unavailable_on: Vec<usize>,
    pub calls: AtomicUsize,
}

impl FlakyResolver {
    pub fn new(self_id: &str, unavailable_on: &[usize]) -> Self {
        Self {
            inner: StaticResolver::new(self_id),
            unavailable_on: unavailable_on.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SessionResolver for FlakyResolver {
    async fn resolve_session(&self) -> Result<SessionInfo> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.unavailable_on.contains(&call) {
            return Err(Error::Unavailable(503));
        }
        self.inner.resolve_session().await
    }
}

pub struct FailingResolver;

#[async_trait]
impl SessionResolver for FailingResolver {
    async fn resolve_session(&self) -> Result<SessionInfo> {
        Err(Error::Bootstrap("Slack error: invalid_auth".to_string()))
    }
}

pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn next_frame(&mut self) -> Result<Option<String>> {
        Ok(self.rx.recv().await)
    }
}

pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send_frame(&mut self, frame: String) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| Error::Transport("outbound channel closed".to_string()))
    }
}

/// A sink that fails every write.
pub struct BrokenSink;

#[async_trait]
impl FrameSink for BrokenSink {
    async fn send_frame(&mut self, _frame: String) -> Result<()> {
        Err(Error::Transport("broken pipe".to_string()))
    }
}

/// In-memory transport pair: frames pushed to `inbound` are read by the
/// engine, frames written by the engine arrive on `outbound`.
pub fn channel_transport() -> (
    Transport,
    mpsc::UnboundedSender<String>,
    mpsc::UnboundedReceiver<String>,
) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let transport = Transport {
        source: Box::new(ChannelSource { rx: in_rx }),
        sink: Box::new(ChannelSink { tx: out_tx }),
    };
    (transport, in_tx, out_rx)
}

/// Hands out prepared connections in order, then refuses.
pub struct QueuedConnector {
    connections: Mutex<VecDeque<Transport>>,
    pub connects: AtomicUsize,
}

impl QueuedConnector {
    pub fn new(connections: Vec<Transport>) -> Self {
        Self {
            connections: Mutex::new(connections.into()),
            connects: AtomicUsize::new(0),
        }
    }

    /// One connection that delivers `frames` and then closes. Everything the
    /// engine writes is collected on the returned receiver.
    pub fn scripted(frames: &[&str]) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (transport, in_tx, out_rx) = channel_transport();
        for frame in frames {
            in_tx.send(frame.to_string()).unwrap();
        }
        drop(in_tx);
        (Self::new(vec![transport]), out_rx)
    }
}

#[async_trait]
impl Connector for QueuedConnector {
    async fn connect(&self, _endpoint: &str) -> Result<Transport> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connections
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Transport("connection refused".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichPost {
    pub channel: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Default)]
pub struct RecordingPoster {
    pub posts: Mutex<Vec<RichPost>>,
}

impl RecordingPoster {
    pub fn posts(&self) -> Vec<RichPost> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RichPoster for RecordingPoster {
    async fn post_rich_message(
        &self,
        channel: &str,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<()> {
        self.posts.lock().unwrap().push(RichPost {
            channel: channel.to_string(),
            text: text.to_string(),
            attachments: attachments.to_vec(),
        });
        Ok(())
    }
}

/// Drain everything currently queued on an outbound receiver.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<serde_json::Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).unwrap());
    }
    frames
}
