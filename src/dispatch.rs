use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Delivery;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::platform::{FrameSink, RichPoster};

#[derive(Default)]
struct MuteTimer {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct MuteWindow {
    muted: AtomicBool,
    timer: Mutex<MuteTimer>,
}

/// Serializes outgoing messages onto the transport or the rich-post API.
///
/// Writes to the transport go through a single lock, so sequence ids
/// appear on the wire in increasing order no matter how many tasks send
/// concurrently.
pub struct Dispatcher {
    sequence: AtomicU64,
    sink: tokio::sync::Mutex<Option<Box<dyn FrameSink>>>,
    poster: Arc<dyn RichPoster>,
    mute: Arc<MuteWindow>,
}

impl Dispatcher {
    pub fn new(poster: Arc<dyn RichPoster>) -> Self {
        Self {
            sequence: AtomicU64::new(0),
            sink: tokio::sync::Mutex::new(None),
            poster,
            mute: Arc::new(MuteWindow::default()),
        }
    }

    /// Install the write half of a freshly opened connection.
    pub async fn attach(&self, sink: Box<dyn FrameSink>) {
        *self.sink.lock().await = Some(sink);
    }

    pub async fn detach(&self) {
        self.sink.lock().await.take();
    }

    /// Write `message` to the transport and return its sequence id.
    pub async fn send(&self, mut message: Message) -> Result<u64> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(Error::NotConnected)?;

        message.sequence_id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = serde_json::to_string(&message)?;
        sink.send_frame(frame).await?;

        debug!(
            "Sent message {} to channel {}",
            message.sequence_id, message.channel_id
        );
        Ok(message.sequence_id)
    }

    /// Post `message` with its attachments through the rich-post API.
    pub async fn post(&self, message: &Message) -> Result<()> {
        self.poster
            .post_rich_message(&message.channel_id, &message.text, &message.attachments)
            .await
    }

    /// Deliver `message` unless muted. Dropped silently while muted.
    pub async fn say(&self, message: Message, delivery: Delivery) -> Result<()> {
        if self.is_muted() {
            debug!("Muted, dropping message to channel {}", message.channel_id);
            return Ok(());
        }

        let result = match delivery {
            Delivery::Rtm if message.attachments.is_empty() => self.send(message).await.map(|_| ()),
            Delivery::Rtm | Delivery::Web => self.post(&message).await,
        };
        if let Err(e) = &result {
            warn!("Failed to deliver message: {}", e);
        }
        result
    }

    pub fn is_muted(&self) -> bool {
        self.mute.muted.load(Ordering::SeqCst)
    }

    /// Suppress `say` for `duration`. Returns immediately.
    ///
    /// A later call replaces any pending unmute from an earlier one.
    pub fn mute(&self, duration: Duration) {
        let window = Arc::clone(&self.mute);
        let mut timer = self
            .mute
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        timer.generation += 1;
        let generation = timer.generation;
        if let Some(previous) = timer.handle.take() {
            previous.abort();
        }

        self.mute.muted.store(true, Ordering::SeqCst);
        info!("Muting for {:?}", duration);

        timer.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let timer = window.timer.lock().unwrap_or_else(PoisonError::into_inner);
            if timer.generation == generation {
                window.muted.store(false, Ordering::SeqCst);
                info!("Unmuting");
            }
        }));
    }

    /// End the current mute window early.
    pub fn unmute(&self) {
        let mut timer = self
            .mute
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        timer.generation += 1;
        if let Some(previous) = timer.handle.take() {
            previous.abort();
        }
        if self.mute.muted.swap(false, Ordering::SeqCst) {
            info!("Unmuting");
        }
    }
}
