use std::sync::Arc;

use ftb_core::{config::Config, memory::ConversationMemory, security::RateLimiter};
use ftb_flowise::FlowiseClient;
use ftb_telegram::{
    router::{self, AppState},
    TelegramMessenger,
};

#[tokio::main]
async fn main() -> Result<(), ftb_core::Error> {
    ftb_core::logging::init("ftb")?;

    let cfg = Arc::new(Config::load()?);

    let messenger = Arc::new(TelegramMessenger::new(
        &cfg.telegram_token,
        cfg.send_timeout,
        cfg.message_limit,
    )?);
    let backend = Arc::new(FlowiseClient::new(
        cfg.backend_url.clone(),
        cfg.backend_api_key.clone(),
        cfg.request_timeout,
    )?);

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        messenger,
        backend,
        memory: Arc::new(ConversationMemory::new()),
        rate_limiter: Arc::new(RateLimiter::new(cfg.min_message_interval)),
    });

    router::serve(state)
        .await
        .map_err(|e| ftb_core::Error::External(format!("webhook server failed: {e}")))?;

    Ok(())
}
