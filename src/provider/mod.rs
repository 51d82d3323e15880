//! Provider Adapter contract (spec §4.B, §6 Egress) — a uniform async
//! invocation surface over heterogeneous AI vendors. The core only sees the
//! closed tagged union in [`ProviderResponse`] plus an `extensions` map;
//! adapters own the translation from whatever shape a given vendor SDK
//! returns (spec §9 redesign note on dynamic/duck-typed payloads).

mod cancellation;
mod mock;
mod ollama_style;
mod openai_compatible;
mod rate_limit;

pub use cancellation::CancellationToken;
pub use mock::MockAdapter;
pub use ollama_style::OllamaStyleAdapter;
pub use openai_compatible::OpenAiCompatibleAdapter;
pub use rate_limit::RateLimitedAdapter;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub text: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub latency_ms: u64,
    #[serde(default)]
    pub extensions: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct InvokeParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system: Option<String>,
}

/// Uniform async invocation surface every vendor adapter must implement.
/// Cancellation must abort the in-flight network call, not merely stop
/// awaiting it (spec §6 Egress).
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn invoke(
        &self,
        model_id: &str,
        prompt: &str,
        params: &InvokeParams,
        cancellation: &CancellationToken,
    ) -> Result<ProviderResponse>;
}

/// Maps a lower-level transport error into the closed provider-error union
/// (spec §7). Adapters call this at their boundary rather than letting
/// `reqwest`/transport errors leak upward untyped.
pub fn classify_transport_error(status: Option<u16>, message: impl Into<String>) -> OrchestratorError {
    let message = message.into();
    match status {
        Some(429) => OrchestratorError::RateLimited(message),
        Some(400..=499) => OrchestratorError::InvalidRequest(message),
        Some(500..=599) | None => OrchestratorError::ProviderUnavailable(message),
        _ => OrchestratorError::ProviderUnavailable(message),
    }
}
