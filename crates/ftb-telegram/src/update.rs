//! Inbound webhook wire types.
//!
//! Only the fields the pipeline consumes are modeled; Telegram sends many
//! more, all ignored on deserialization.

use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookUpdate {
    pub message: Option<IncomingMessage>,
    pub edited_message: Option<IncomingMessage>,
}

impl WebhookUpdate {
    /// New messages and edits are treated alike; anything else (channel
    /// posts, member updates, ...) is a no-op event.
    pub fn message(&self) -> Option<&IncomingMessage> {
        self.message.as_ref().or(self.edited_message.as_ref())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub from: Option<Sender>,
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Sender {
    pub id: i64,
}
