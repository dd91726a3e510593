//! Reasoning oracle boundary.
//!
//! The oracle is a black box: a system persona plus a user prompt go in, raw
//! text comes out. Callers own parsing and treat every error as "no output".

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::OracleConfig;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Http(String),

    #[error("oracle API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle returned empty content")]
    EmptyContent,
}

/// One chat-completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub temperature: f32,
    /// Ask the service for a JSON object response.
    pub json_mode: bool,
}

#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

/// OpenAI-compatible `POST {base_url}/chat/completions` client.
pub struct OpenAiOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiOracle {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout,
        })
    }
}

/// Chat-completions body for `request`.
pub fn request_body(request: &OracleRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": request.model,
        "temperature": request.temperature,
        "messages": [
            {"role": "system", "content": request.system},
            {"role": "user", "content": request.user},
        ],
    });
    if request.json_mode {
        body["response_format"] = serde_json::json!({"type": "json_object"});
    }
    body
}

#[async_trait]
impl ReasoningOracle for OpenAiOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(self.timeout)
                } else {
                    OracleError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status { status, body });
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OracleError::Http(e.to_string()))?;

        let content = resp_json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();
        if content.trim().is_empty() {
            return Err(OracleError::EmptyContent);
        }
        debug!(model = %request.model, chars = content.len(), "Oracle call completed");
        Ok(content)
    }
}
