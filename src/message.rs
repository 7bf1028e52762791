use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Event kind of an ordinary user message. Only these are routed.
pub const MESSAGE_KIND: &str = "message";

/// Canonical message shared by routing and dispatch.
///
/// Serializes to the outgoing realtime envelope:
/// `{id, type, channel, text, user, attachments?}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Message {
    #[serde(rename = "id")]
    pub sequence_id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "channel")]
    pub channel_id: String,
    #[serde(rename = "user")]
    pub sender_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// A reply to this message: same channel and sender, new text.
    pub fn reply(&self, text: impl Into<String>) -> Self {
        Self {
            sequence_id: 0,
            kind: MESSAGE_KIND.to_string(),
            channel_id: self.channel_id.clone(),
            sender_id: self.sender_id.clone(),
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn is_user_message(&self) -> bool {
        self.kind == MESSAGE_KIND
    }
}

/// Presentational extras for outgoing rich posts. Ignored on inbound messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
}

/// Inbound envelope as read off the transport, before normalization.
///
/// `channel` and `user` are kept as raw JSON because the platform sends
/// either a bare id string or an object carrying an `id`.
#[derive(Debug, Deserialize)]
pub struct RawInboundFrame {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub channel: Option<Value>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
}

/// Either encoding of a channel or user reference. Variant order is the
/// decode order: the bare string first, then the object form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdRef {
    Bare(String),
    Object { id: String },
}

impl IdRef {
    fn into_id(self) -> String {
        match self {
            IdRef::Bare(id) | IdRef::Object { id } => id,
        }
    }
}

/// Flatten a polymorphic id field, degrading to an empty string.
fn flatten_id(field: &str, value: Option<Value>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    match serde_json::from_value::<IdRef>(value) {
        Ok(id) => id.into_id(),
        Err(e) => {
            debug!("Undecodable {} field, leaving it empty: {}", field, e);
            String::new()
        }
    }
}

impl RawInboundFrame {
    pub fn normalize(self) -> Message {
        Message {
            sequence_id: self.id.unwrap_or_default(),
            kind: self.kind.unwrap_or_default(),
            channel_id: flatten_id("channel", self.channel),
            sender_id: flatten_id("user", self.user),
            text: self.text.unwrap_or_default(),
            attachments: Vec::new(),
        }
    }
}

/// Decode one raw transport frame into a canonical [`Message`].
///
/// Only a frame that cannot be read as the envelope at all is an error;
/// bad `channel`/`user` encodings just leave those fields empty.
pub fn normalize(frame: &str) -> Result<Message> {
    let raw: RawInboundFrame = serde_json::from_str(frame).map_err(Error::MalformedFrame)?;
    Ok(raw.normalize())
}
