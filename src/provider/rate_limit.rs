//! Client-side outbound throttling, per provider. Vendors hand back
//! `RateLimited` on a 429 (`classify_transport_error`) but a well-behaved
//! client should not depend on that as its only backpressure signal — this
//! wraps any [`ProviderAdapter`] so repeated `invoke` calls self-throttle
//! before ever reaching the wire.
//!
//! Replaces the teacher's hand-rolled `TokenBucket` (`safety/rate_limiter.rs`)
//! with `governor`, which the teacher already depends on for this exact
//! purpose.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{Quota, RateLimiter as GovernorRateLimiter};

use super::{CancellationToken, InvokeParams, ProviderAdapter, ProviderResponse};
use crate::error::{OrchestratorError, Result};

type DirectRateLimiter = GovernorRateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Wraps an adapter with a requests-per-minute quota. Calls that would
/// exceed the quota wait for the next available slot rather than failing
/// outright, up to `max_wait`; beyond that they're rejected as `RateLimited`
/// so a caller still bounded by a request-level timeout doesn't stall
/// forever behind someone else's quota.
pub struct RateLimitedAdapter<A: ProviderAdapter> {
    inner: A,
    limiter: Arc<DirectRateLimiter>,
    max_wait: std::time::Duration,
}

impl<A: ProviderAdapter> RateLimitedAdapter<A> {
    pub fn new(inner: A, requests_per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute.max(1)).unwrap());
        Self {
            inner,
            limiter: Arc::new(GovernorRateLimiter::direct(quota)),
            max_wait: std::time::Duration::from_secs(10),
        }
    }

    pub fn with_max_wait(mut self, max_wait: std::time::Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}

#[async_trait]
impl<A: ProviderAdapter> ProviderAdapter for RateLimitedAdapter<A> {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    async fn invoke(
        &self,
        model_id: &str,
        prompt: &str,
        params: &InvokeParams,
        cancellation: &CancellationToken,
    ) -> Result<ProviderResponse> {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                return Err(OrchestratorError::Cancelled(format!("{} call cancelled while rate-limited", self.provider_name())));
            }
            wait = self.limiter.until_ready() => wait,
            _ = tokio::time::sleep(self.max_wait) => {
                return Err(OrchestratorError::RateLimited(format!(
                    "{} exceeded local rate limit for longer than {:?}",
                    self.provider_name(),
                    self.max_wait
                )));
            }
        }

        self.inner.invoke(model_id, prompt, params, cancellation).await
    }
}
