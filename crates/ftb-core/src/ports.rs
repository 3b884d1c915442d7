use async_trait::async_trait;

use crate::{domain::ChatId, Result};

/// Outbound side of the messaging platform.
///
/// Implementations truncate to their own message limit and perform exactly
/// one send attempt per call; the pipeline never retries.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn max_message_len(&self) -> usize;

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;
}

/// The conversational-AI backend the bridge relays questions to.
#[async_trait]
pub trait BackendPort: Send + Sync {
    /// Whether a backend endpoint is configured at all (reported by `/health`).
    fn is_configured(&self) -> bool;

    /// One question, one answer. `history` is the recent-turn context, oldest
    /// first. Any transport, status, or parse failure maps to
    /// [`crate::Error::Backend`]; the call is attempted at most once.
    async fn ask(&self, chat_id: ChatId, question: &str, history: &[String]) -> Result<String>;
}
