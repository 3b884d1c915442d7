use std::{env, fs, net::SocketAddr, path::Path, time::Duration};

use crate::{errors::Error, Result};

/// Typed configuration for the bridge, loaded once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    pub allowed_user_ids: Vec<String>,
    pub send_timeout: Duration,
    pub message_limit: usize,

    // Flowise
    pub backend_url: Option<String>,
    pub backend_api_key: Option<String>,
    pub request_timeout: Duration,

    // Pipeline
    pub min_message_interval: Duration,
    pub history_cap: usize,
    pub context_window: usize,

    // HTTP server
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_token = env_str("TELEGRAM_TOKEN")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("TELEGRAM_TOKEN environment variable is required".to_string())
            })?;

        // Empty allow-list means open mode; the gate handles it.
        let allowed_user_ids = parse_csv(env_str("ALLOWED_USER_IDS"));

        let backend_url = env_str("FLOWISE_API_URL").and_then(non_empty);
        let backend_api_key = env_str("FLOWISE_API_KEY").and_then(non_empty);

        let request_timeout = Duration::from_secs(env_u64("TIMEOUT_SECONDS").unwrap_or(60));
        let send_timeout = Duration::from_secs(env_u64("SEND_TIMEOUT_SECONDS").unwrap_or(30));

        let min_message_interval =
            Duration::from_millis(env_u64("MIN_MESSAGE_INTERVAL_MS").unwrap_or(1_500));
        let history_cap = env_usize("HISTORY_CAP").unwrap_or(16);
        let context_window = env_usize("CONTEXT_WINDOW").unwrap_or(8);
        let message_limit = env_usize("TELEGRAM_MESSAGE_LIMIT").unwrap_or(4096);

        let host = env_str("HOST")
            .and_then(non_empty)
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let port = env_u64("PORT").unwrap_or(8080);
        let bind_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("invalid HOST/PORT: {e}")))?;

        Ok(Self {
            telegram_token,
            allowed_user_ids,
            send_timeout,
            message_limit,
            backend_url,
            backend_api_key,
            request_timeout,
            min_message_interval,
            history_cap,
            context_window,
            bind_addr,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
