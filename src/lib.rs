//! Chat-automation bots over a realtime messaging session.
//!
//! A [`Bot`] holds two pattern registries. *Hear* actions run on every user
//! message; *respond* actions run only on messages that start with a
//! mention of the bot. Handlers receive a [`Session`] to reply, post rich
//! messages, or mute the bot for a while.

pub mod bot;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod platform;
pub mod registry;
pub mod session;

pub use bot::Bot;
pub use config::{Config, Delivery, OnError};
pub use error::{Error, Result};
pub use message::{Attachment, Message};
pub use registry::{Action, ActionContext, ActionSet};
pub use session::Session;
