use std::sync::Arc;
use std::time::Duration;

use crate::config::Delivery;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::message::{Attachment, Message};
use crate::registry::{Action, ActionSet, Registry};

struct SessionInner {
    name: String,
    self_id: String,
    delivery: Delivery,
    registry: Arc<Registry>,
    dispatcher: Arc<Dispatcher>,
}

/// Handle given to every action handler.
///
/// Cheap to clone and safe to move into spawned tasks. Exposes the bot's
/// identity, read-only registries, and the send capabilities.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub(crate) fn new(
        name: String,
        self_id: String,
        delivery: Delivery,
        registry: Arc<Registry>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                name,
                self_id,
                delivery,
                registry,
                dispatcher,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn self_id(&self) -> &str {
        &self.inner.self_id
    }

    /// The token that addresses this bot, e.g. `<@U123>`.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.inner.self_id)
    }

    pub fn is_addressed(&self, text: &str) -> bool {
        text.starts_with(&self.mention())
    }

    /// Text following the leading mention, trimmed of separators.
    /// Unaddressed text is returned unchanged.
    pub fn strip_mention<'a>(&self, text: &'a str) -> &'a str {
        match text.strip_prefix(&self.mention()) {
            Some(rest) => rest.trim_start_matches([':', ',']).trim(),
            None => text,
        }
    }

    pub fn actions(&self, set: ActionSet) -> Vec<&Action> {
        self.inner.registry.set(set).list()
    }

    pub fn help_text(&self) -> String {
        self.inner.registry.help_text()
    }

    /// Reply to `message` with `text` using the configured delivery.
    /// A no-op while muted.
    pub async fn say(&self, message: &Message, text: &str) -> Result<()> {
        self.inner
            .dispatcher
            .say(message.reply(text), self.inner.delivery)
            .await
    }

    /// Reply with attachments through the rich-post API. A no-op while muted.
    pub async fn say_with_attachments(
        &self,
        message: &Message,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<()> {
        let mut reply = message.reply(text);
        reply.attachments = attachments;
        self.inner.dispatcher.say(reply, Delivery::Web).await
    }

    /// Write `message` straight to the realtime transport.
    pub async fn send(&self, message: Message) -> Result<u64> {
        self.inner.dispatcher.send(message).await
    }

    /// Post `message` through the rich-post API.
    pub async fn post_message(&self, message: &Message) -> Result<()> {
        self.inner.dispatcher.post(message).await
    }

    pub fn mute(&self, duration: Duration) {
        self.inner.dispatcher.mute(duration);
    }

    pub fn unmute(&self) {
        self.inner.dispatcher.unmute();
    }

    pub fn is_muted(&self) -> bool {
        self.inner.dispatcher.is_muted()
    }
}
