//! Deterministic in-memory adapter for tests — grounded on the teacher's
//! test doubles in `agent/cache.rs`'s test module.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{CancellationToken, InvokeParams, ProviderAdapter, ProviderResponse};
use crate::error::{OrchestratorError, Result};

pub struct MockAdapter {
    name: String,
    response_text: String,
    delay: std::time::Duration,
    fail: bool,
    call_count: AtomicU64,
}

impl MockAdapter {
    pub fn new(name: impl Into<String>, response_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response_text: response_text.into(),
            delay: std::time::Duration::from_millis(0),
            fail: false,
            call_count: AtomicU64::new(0),
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        _model_id: &str,
        prompt: &str,
        _params: &InvokeParams,
        cancellation: &CancellationToken,
    ) -> Result<ProviderResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = cancellation.cancelled() => {
                    return Err(OrchestratorError::Cancelled(format!("{} call cancelled", self.name)));
                }
            }
        }

        if self.fail {
            return Err(OrchestratorError::ProviderUnavailable(format!(
                "{} is configured to fail",
                self.name
            )));
        }

        Ok(ProviderResponse {
            text: format!("{}: {}", self.response_text, prompt),
            tokens_in: prompt.split_whitespace().count() as u32,
            tokens_out: self.response_text.split_whitespace().count() as u32,
            latency_ms: self.delay.as_millis() as u64,
            extensions: Default::default(),
        })
    }
}
