//! Local/self-hosted HTTP adapter for Ollama-style `/api/chat` endpoints.
//! Grounded on the teacher's `OllamaProvider`, reworked to plain `reqwest`
//! (the teacher's `ollama-rs` dependency pulled in local model-management
//! concerns this core doesn't need) against the closed
//! [`super::ProviderResponse`] union instead of a raw string.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{classify_transport_error, CancellationToken, InvokeParams, ProviderAdapter, ProviderResponse};
use crate::error::{OrchestratorError, Result};

pub struct OllamaStyleAdapter {
    client: Client,
    base_url: String,
}

impl OllamaStyleAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaStyleAdapter {
    fn provider_name(&self) -> &str {
        "ollama"
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
            "stream": false,
        });

        let started = Instant::now();
        let request = self
            .client
            .post(format!("{}/api/chat", self.base_url.trim_end_matches('/')))
            .json(&body)
            .send();

        let response = tokio::select! {
            res = request => res.map_err(|e| classify_transport_error(e.status().map(|s| s.as_u16()), e.to_string()))?,
            _ = cancellation.cancelled() => {
                return Err(OrchestratorError::Cancelled("ollama call cancelled".to_string()));
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
            .map_err(|e| OrchestratorError::ProviderUnavailable(format!("malformed ollama response: {e}")))?;

        let text = value["message"]["content"]
            .as_str()
            .ok_or_else(|| OrchestratorError::ProviderUnavailable("ollama response missing message.content".to_string()))?
            .to_string();

        Ok(ProviderResponse {
            tokens_in: value["prompt_eval_count"].as_u64().unwrap_or(0) as u32,
            tokens_out: value["eval_count"].as_u64().unwrap_or(0) as u32,
            latency_ms: started.elapsed().as_millis() as u64,
            text,
            extensions: Default::default(),
        })
    }
}
