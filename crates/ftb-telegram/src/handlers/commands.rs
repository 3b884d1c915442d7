use ftb_core::domain::ChatId;

use crate::router::AppState;

pub const GREETING: &str = "Olá! Sou seu assistente IA integrado ao Flowise.";
pub const RESET_DONE: &str = "Contexto resetado.";
pub const STATUS_OK: &str = "✅ Online.";

/// Slash commands the bridge short-circuits before any backend call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Novo,
    Status,
}

/// Case-sensitive prefix match, evaluated in priority order.
pub fn parse(text: &str) -> Option<Command> {
    const COMMANDS: [(&str, Command); 3] = [
        ("/start", Command::Start),
        ("/novo", Command::Novo),
        ("/status", Command::Status),
    ];

    COMMANDS
        .iter()
        .find(|(prefix, _)| text.starts_with(prefix))
        .map(|&(_, cmd)| cmd)
}

/// Only `/novo` touches conversation memory; the others are pure replies.
pub async fn handle(state: &AppState, chat_id: ChatId, cmd: Command) {
    match cmd {
        Command::Start => super::send_best_effort(state, chat_id, GREETING).await,
        Command::Novo => {
            state.memory.reset(chat_id);
            super::send_best_effort(state, chat_id, RESET_DONE).await;
        }
        Command::Status => super::send_best_effort(state, chat_id, STATUS_OK).await,
    }
}
