//! Telegram adapter.
//!
//! The outbound side implements the core `MessagingPort` over the Bot API
//! (teloxide); the inbound side is the webhook server in `router` plus the
//! pipeline in `handlers`.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;

use ftb_core::{
    domain::ChatId, errors::Error, ports::MessagingPort, utils::truncate_chars, Result,
};

pub mod handlers;
pub mod router;
pub mod update;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    max_message_len: usize,
}

impl TelegramMessenger {
    /// `send_timeout` is independent of the backend request timeout.
    pub fn new(token: &str, send_timeout: Duration, max_message_len: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(send_timeout)
            .build()
            .map_err(|e| Error::Config(format!("telegram http client: {e}")))?;

        Ok(Self {
            bot: Bot::with_client(token, client),
            max_message_len,
        })
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn max_message_len(&self) -> usize {
        self.max_message_len
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let text = truncate_chars(text, self.max_message_len);
        self.bot
            .send_message(teloxide::types::ChatId(chat_id.0), text)
            .await
            .map_err(|e| Error::External(format!("telegram sendMessage error: {e}")))?;
        Ok(())
    }
}
