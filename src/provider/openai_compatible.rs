//! Generic HTTP adapter for OpenAI-compatible chat-completion endpoints.
//! Grounded on the teacher's `OpenAICompatibleProvider`, minus its streaming
//! path — the core only needs a single completed [`ProviderResponse`] per
//! call, so `stream: true` and incremental chunk parsing are dropped.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{classify_transport_error, CancellationToken, InvokeParams, ProviderAdapter, ProviderResponse};
use crate::error::{OrchestratorError, Result};

pub struct OpenAiCompatibleAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    provider_name: String,
}

impl OpenAiCompatibleAdapter {
    pub fn new(provider_name: impl Into<String>, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            provider_name: provider_name.into(),
        }
    }

    /// Reads the API key from the environment once, at construction, per
    /// spec §6's "Provider credentials (read once at provider-adapter
    /// init)".
    pub fn from_env(provider_name: impl Into<String>, base_url: impl Into<String>, env_var: &str) -> Self {
        Self::new(provider_name, base_url, std::env::var(env_var).ok())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    async fn invoke(
        &self,
        model_id: &str,
        prompt: &str,
        params: &InvokeParams,
        cancellation: &CancellationToken,
    ) -> Result<ProviderResponse> {
        let mut messages = Vec::new();
        if let Some(sys) = &params.system {
            messages.push(json!({ "role": "system", "content": sys }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let body = json!({
            "model": model_id,
            "messages": messages,
            "temperature": params.temperature.unwrap_or(0.7),
            "max_tokens": params.max_tokens,
            "stream": false,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let started = Instant::now();
        let response = tokio::select! {
            res = request.send() => res.map_err(|e| classify_transport_error(e.status().map(|s| s.as_u16()), e.to_string()))?,
            _ = cancellation.cancelled() => {
                return Err(OrchestratorError::Cancelled(format!("{} call cancelled", self.provider_name)));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_transport_error(Some(status.as_u16()), text));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OrchestratorError::ProviderUnavailable(format!("malformed response: {e}")))?;

        let text = value["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| OrchestratorError::ProviderUnavailable("response missing choices[0].message.content".to_string()))?
            .to_string();

        Ok(ProviderResponse {
            tokens_in: value["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            tokens_out: value["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
            latency_ms: started.elapsed().as_millis() as u64,
            text,
            extensions: Default::default(),
        })
    }
}
