//! Flowise adapter.
//!
//! One HTTP POST per question, bearer auth when a key is configured. The
//! polymorphic answer shape is contained to this crate's response type.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ftb_core::{domain::ChatId, errors::Error, ports::BackendPort, Result};

/// Placeholder answer when the backend responds with none of the known fields.
pub const NO_RESPONSE: &str = "Sem resposta.";

#[derive(Clone)]
pub struct FlowiseClient {
    url: Option<String>,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl FlowiseClient {
    pub fn new(url: Option<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("flowise http client: {e}")))?;
        Ok(Self { url, api_key, http })
    }
}

#[derive(Serialize)]
struct AskPayload<'a> {
    question: &'a str,
    #[serde(rename = "overrideConfig")]
    override_config: OverrideConfig<'a>,
}

#[derive(Serialize)]
struct OverrideConfig<'a> {
    #[serde(rename = "sessionId")]
    session_id: String,
    metadata: Metadata<'a>,
}

#[derive(Serialize)]
struct Metadata<'a> {
    history: &'a [String],
}

/// Flowise answers through one of three alternative fields. Extra keys are
/// ignored; absent keys are not an error.
#[derive(Debug, Default, Deserialize)]
struct FlowiseReply {
    text: Option<String>,
    output: Option<String>,
    data: Option<String>,
}

impl FlowiseReply {
    /// First non-empty of `text`, `output`, `data`, in that priority order.
    fn into_answer(self) -> String {
        [self.text, self.output, self.data]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| NO_RESPONSE.to_string())
    }
}

#[async_trait]
impl BackendPort for FlowiseClient {
    fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    async fn ask(&self, chat_id: ChatId, question: &str, history: &[String]) -> Result<String> {
        let Some(url) = &self.url else {
            return Err(Error::Backend(
                "FLOWISE_API_URL is not configured".to_string(),
            ));
        };

        let payload = AskPayload {
            question,
            override_config: OverrideConfig {
                session_id: chat_id.0.to_string(),
                metadata: Metadata { history },
            },
        };

        let mut req = self.http.post(url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::Backend(format!("flowise request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Backend(format!(
                "flowise returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let reply: FlowiseReply = resp
            .json()
            .await
            .map_err(|e| Error::Backend(format!("flowise json error: {e}")))?;

        Ok(reply.into_answer())
    }
}
