//! Webhook request pipeline.
//!
//! One inbound update drives the whole chain: access gate → rate limit →
//! command dispatch → backend turn → outbound reply. Every path acknowledges
//! at the HTTP layer; business failures surface through the chat reply or
//! the logs, never through the webhook's own status.

use serde::Serialize;
use tracing::{debug, error, warn};

use ftb_core::{
    domain::{ChatId, UserId},
    security,
};

use crate::router::AppState;
use crate::update::WebhookUpdate;

pub mod commands;

/// Fixed user-facing message when the backend call fails; the cause stays in
/// the logs.
pub const BACKEND_APOLOGY: &str = "⚠️ Erro ao falar com o motor Flowise.";

/// JSON acknowledgment returned to Telegram for every webhook call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limited: Option<bool>,
}

impl Ack {
    pub fn accepted() -> Self {
        Self {
            ok: true,
            ignored: None,
            rate_limited: None,
        }
    }

    pub fn ignored() -> Self {
        Self {
            ok: true,
            ignored: Some(true),
            rate_limited: None,
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            ok: true,
            ignored: None,
            rate_limited: Some(true),
        }
    }

    /// The webhook call itself succeeded; the business operation did not.
    pub fn failed() -> Self {
        Self {
            ok: false,
            ignored: None,
            rate_limited: None,
        }
    }
}

pub async fn process_update(state: &AppState, update: WebhookUpdate) -> Ack {
    let Some(msg) = update.message() else {
        return Ack::ignored();
    };
    let chat_id = ChatId(msg.chat.id);
    let Some(from) = &msg.from else {
        return Ack::ignored();
    };
    let user_id = UserId(from.id);
    let text = msg.text.clone().unwrap_or_default();

    // Same ack as a no-op event: no reply, no distinguishing signal.
    if !security::is_allowed(user_id, &state.cfg.allowed_user_ids) {
        debug!("dropping update from user {} (not on allow-list)", user_id.0);
        return Ack::ignored();
    }

    if state.rate_limiter.is_limited(user_id) {
        debug!("rate-limited user {}", user_id.0);
        return Ack::rate_limited();
    }

    if text.starts_with('/') {
        if let Some(cmd) = commands::parse(&text) {
            commands::handle(state, chat_id, cmd).await;
            return Ack::accepted();
        }
        // Unrecognized slash text falls through to the backend.
    }

    let history = state.memory.get_recent(chat_id, state.cfg.context_window);
    let answer = match state.backend.ask(chat_id, &text, &history).await {
        Ok(answer) => answer,
        Err(e) => {
            error!("backend call failed for chat {}: {e}", chat_id.0);
            send_best_effort(state, chat_id, BACKEND_APOLOGY).await;
            return Ack::failed();
        }
    };

    state.memory.append_and_trim(
        chat_id,
        [format!("U:{text}"), format!("A:{answer}")],
        state.cfg.history_cap,
    );

    send_best_effort(state, chat_id, &answer).await;
    Ack::accepted()
}

/// Outbound sends are the terminal step: failures are logged and swallowed.
async fn send_best_effort(state: &AppState, chat_id: ChatId, text: &str) {
    if let Err(e) = state.messenger.send_text(chat_id, text).await {
        warn!("sendMessage to chat {} failed: {e}", chat_id.0);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use ftb_core::{
        config::Config,
        domain::ChatId,
        errors::Error,
        memory::ConversationMemory,
        ports::{BackendPort, MessagingPort},
        security::RateLimiter,
        utils::truncate_chars,
        Result,
    };

    use super::*;

    #[derive(Default)]
    struct FakeMessenger {
        sends: Mutex<Vec<(i64, String)>>,
        fail: bool,
    }

    impl FakeMessenger {
        fn sent(&self) -> Vec<(i64, String)> {
            self.sends.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn max_message_len(&self) -> usize {
            4096
        }

        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
            if self.fail {
                return Err(Error::External("telegram is down".to_string()));
            }
            self.sends
                .lock()
                .unwrap()
                .push((chat_id.0, truncate_chars(text, self.max_message_len())));
            Ok(())
        }
    }

    enum Reply {
        Answer(String),
        Fail,
    }

    struct FakeBackend {
        reply: Reply,
        asked: Mutex<Vec<(i64, String, Vec<String>)>>,
    }

    impl FakeBackend {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                asked: Mutex::new(Vec::new()),
            }
        }

        fn questions(&self) -> Vec<(i64, String, Vec<String>)> {
            self.asked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BackendPort for FakeBackend {
        fn is_configured(&self) -> bool {
            true
        }

        async fn ask(
            &self,
            chat_id: ChatId,
            question: &str,
            history: &[String],
        ) -> Result<String> {
            self.asked
                .lock()
                .unwrap()
                .push((chat_id.0, question.to_string(), history.to_vec()));
            match &self.reply {
                Reply::Answer(a) => Ok(a.clone()),
                Reply::Fail => Err(Error::Backend("flowise returned 500".to_string())),
            }
        }
    }

    fn test_config(allowed: &[&str]) -> Arc<Config> {
        Arc::new(Config {
            telegram_token: "x".to_string(),
            allowed_user_ids: allowed.iter().map(|s| s.to_string()).collect(),
            send_timeout: Duration::from_secs(1),
            message_limit: 4096,
            backend_url: Some("http://localhost:3000/api/v1/prediction/x".to_string()),
            backend_api_key: None,
            request_timeout: Duration::from_secs(1),
            min_message_interval: Duration::from_millis(1_500),
            history_cap: 16,
            context_window: 8,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
        })
    }

    fn test_state(
        allowed: &[&str],
        reply: Reply,
    ) -> (Arc<AppState>, Arc<FakeMessenger>, Arc<FakeBackend>) {
        let messenger = Arc::new(FakeMessenger::default());
        let backend = Arc::new(FakeBackend::new(reply));
        let state = Arc::new(AppState {
            cfg: test_config(allowed),
            messenger: messenger.clone(),
            backend: backend.clone(),
            memory: Arc::new(ConversationMemory::new()),
            rate_limiter: Arc::new(RateLimiter::new(Duration::from_millis(1_500))),
        });
        (state, messenger, backend)
    }

    fn text_update(chat: i64, user: i64, text: &str) -> WebhookUpdate {
        serde_json::from_value(json!({
            "update_id": 1,
            "message": {
                "chat": {"id": chat},
                "from": {"id": user},
                "text": text
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn updates_without_a_message_payload_are_ignored() {
        let (state, messenger, backend) = test_state(&[], Reply::Answer("hi".to_string()));

        let update: WebhookUpdate =
            serde_json::from_value(json!({"update_id": 2, "my_chat_member": {}})).unwrap();
        let ack = process_update(&state, update).await;

        assert_eq!(ack, Ack::ignored());
        assert!(messenger.sent().is_empty());
        assert!(backend.questions().is_empty());
    }

    #[tokio::test]
    async fn messages_without_a_sender_are_ignored() {
        let (state, messenger, _) = test_state(&[], Reply::Answer("hi".to_string()));

        let update: WebhookUpdate = serde_json::from_value(json!({
            "message": {"chat": {"id": 42}, "text": "hello"}
        }))
        .unwrap();

        assert_eq!(process_update(&state, update).await, Ack::ignored());
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_users_are_dropped_silently() {
        let (state, messenger, backend) = test_state(&["7"], Reply::Answer("hi".to_string()));

        let ack = process_update(&state, text_update(42, 9, "hello")).await;

        assert_eq!(ack, Ack::ignored());
        assert!(messenger.sent().is_empty());
        assert!(backend.questions().is_empty());
    }

    #[tokio::test]
    async fn empty_allow_list_admits_everyone() {
        let (state, messenger, _) = test_state(&[], Reply::Answer("hi".to_string()));

        let ack = process_update(&state, text_update(42, 9_999, "hello")).await;

        assert_eq!(ack, Ack::accepted());
        assert_eq!(messenger.sent(), vec![(42, "hi".to_string())]);
    }

    #[tokio::test]
    async fn rapid_second_message_is_rate_limited() {
        let (state, messenger, backend) = test_state(&[], Reply::Answer("hi".to_string()));

        assert_eq!(
            process_update(&state, text_update(42, 7, "one")).await,
            Ack::accepted()
        );
        assert_eq!(
            process_update(&state, text_update(42, 7, "two")).await,
            Ack::rate_limited()
        );

        // Only the first message reached the backend and produced a reply.
        assert_eq!(backend.questions().len(), 1);
        assert_eq!(messenger.sent().len(), 1);
    }

    #[tokio::test]
    async fn start_command_sends_greeting_without_backend_call() {
        let (state, messenger, backend) = test_state(&[], Reply::Answer("hi".to_string()));

        let ack = process_update(&state, text_update(42, 7, "/start")).await;

        assert_eq!(ack, Ack::accepted());
        assert_eq!(messenger.sent(), vec![(42, commands::GREETING.to_string())]);
        assert!(backend.questions().is_empty());
    }

    #[tokio::test]
    async fn novo_resets_history_and_confirms() {
        let (state, messenger, backend) = test_state(&[], Reply::Answer("hi".to_string()));
        let chat = ChatId(42);
        state.memory.append_and_trim(
            chat,
            ["U:antes".to_string(), "A:resposta".to_string()],
            16,
        );

        let ack = process_update(&state, text_update(42, 7, "/novo")).await;

        assert_eq!(ack, Ack::accepted());
        assert!(state.memory.get_recent(chat, 8).is_empty());
        assert_eq!(
            messenger.sent(),
            vec![(42, commands::RESET_DONE.to_string())]
        );
        assert!(backend.questions().is_empty());
    }

    #[tokio::test]
    async fn status_command_acknowledges_health() {
        let (state, messenger, _) = test_state(&[], Reply::Answer("hi".to_string()));

        process_update(&state, text_update(42, 7, "/status")).await;

        assert_eq!(messenger.sent(), vec![(42, commands::STATUS_OK.to_string())]);
    }

    #[tokio::test]
    async fn unknown_slash_text_goes_to_the_backend() {
        let (state, _, backend) = test_state(&[], Reply::Answer("hi".to_string()));

        process_update(&state, text_update(42, 7, "/ajuda")).await;

        assert_eq!(backend.questions().len(), 1);
        assert_eq!(backend.questions()[0].1, "/ajuda");
    }

    #[tokio::test]
    async fn answer_is_sent_and_both_turns_are_recorded() {
        let (state, messenger, backend) = test_state(&[], Reply::Answer("Hi there".to_string()));
        let chat = ChatId(42);

        let ack = process_update(&state, text_update(42, 7, "Hello")).await;

        assert_eq!(ack, Ack::accepted());
        assert_eq!(messenger.sent(), vec![(42, "Hi there".to_string())]);
        assert_eq!(
            state.memory.get_recent(chat, 8),
            vec!["U:Hello".to_string(), "A:Hi there".to_string()]
        );
        // The session id and the question travel to the backend as-is.
        assert_eq!(backend.questions()[0].0, 42);
        assert_eq!(backend.questions()[0].1, "Hello");
    }

    #[tokio::test]
    async fn backend_receives_at_most_the_context_window() {
        let (state, _, backend) = test_state(&[], Reply::Answer("ok".to_string()));
        let chat = ChatId(42);
        let seed: Vec<String> = (0..12).map(|i| format!("e{i}")).collect();
        state.memory.append_and_trim(chat, seed, 16);

        process_update(&state, text_update(42, 7, "pergunta")).await;

        let history = &backend.questions()[0].2;
        assert_eq!(history.len(), 8);
        assert_eq!(history.first().map(String::as_str), Some("e4"));
        assert_eq!(history.last().map(String::as_str), Some("e11"));
    }

    #[tokio::test]
    async fn backend_failure_sends_apology_and_leaves_history_alone() {
        let (state, messenger, _) = test_state(&[], Reply::Fail);
        let chat = ChatId(42);
        state
            .memory
            .append_and_trim(chat, ["U:antes".to_string()], 16);

        let ack = process_update(&state, text_update(42, 7, "Hello")).await;

        assert_eq!(ack, Ack::failed());
        assert_eq!(messenger.sent(), vec![(42, BACKEND_APOLOGY.to_string())]);
        assert_eq!(state.memory.get_recent(chat, 8), vec!["U:antes".to_string()]);
    }

    #[tokio::test]
    async fn long_answers_are_truncated_to_the_message_limit() {
        let long = "x".repeat(5_000);
        let (state, messenger, _) = test_state(&[], Reply::Answer(long));

        process_update(&state, text_update(42, 7, "Hello")).await;

        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.chars().count(), 4096);
    }

    #[tokio::test]
    async fn outbound_send_failure_never_escalates() {
        let messenger = Arc::new(FakeMessenger {
            sends: Mutex::new(Vec::new()),
            fail: true,
        });
        let backend = Arc::new(FakeBackend::new(Reply::Answer("hi".to_string())));
        let state = Arc::new(AppState {
            cfg: test_config(&[]),
            messenger: messenger.clone(),
            backend: backend.clone(),
            memory: Arc::new(ConversationMemory::new()),
            rate_limiter: Arc::new(RateLimiter::new(Duration::from_millis(1_500))),
        });

        let ack = process_update(&state, text_update(42, 7, "Hello")).await;

        // The turn still counts as accepted and history is still recorded.
        assert_eq!(ack, Ack::accepted());
        assert_eq!(state.memory.get_recent(ChatId(42), 8).len(), 2);
    }

    #[test]
    fn ack_serializes_with_minimal_flags() {
        assert_eq!(
            serde_json::to_value(Ack::accepted()).unwrap(),
            json!({"ok": true})
        );
        assert_eq!(
            serde_json::to_value(Ack::ignored()).unwrap(),
            json!({"ok": true, "ignored": true})
        );
        assert_eq!(
            serde_json::to_value(Ack::rate_limited()).unwrap(),
            json!({"ok": true, "rate_limited": true})
        );
        assert_eq!(
            serde_json::to_value(Ack::failed()).unwrap(),
            json!({"ok": false})
        );
    }
}
