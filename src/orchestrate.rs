//! Ingress surface (spec §6) — `orchestrate`/`debug_route` plus the
//! `OrchestratorContext` that wires every component together. Replaces the
//! teacher's global `AGENCY_EVENT_BUS`/`lazy_static` singleton pattern
//! (`orchestrator/event_bus.rs`) with an explicit, constructible context per
//! the spec's redesign note against hidden global state: one process may
//! hold several contexts (e.g. in tests) without interfering.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock as AsyncRwLock;

use crate::agents::{AgentBus, AgentRegistry};
use crate::cache::{fingerprint, RoutingCache};
use crate::config::Config;
use crate::domain::{CollapseStrategy, Experience, MetricType, Request, RoutingDecision, ScoringBreakdown};
use crate::error::{OrchestratorError, Result};
use crate::learning::{state, DqnAgent, EpsilonSchedule, LinearQNetwork, RewardWeights, StateContext};
use crate::metrics::MetricsCollector;
use crate::provider::{CancellationToken, InvokeParams, ProviderAdapter, ProviderResponse};
use crate::quantum::WorkerPool;
use crate::registry::ModelRegistry;
use crate::router::{classify_complexity, extract_context, AdvancedRouter};
use crate::routing_manager::{DqnHandle, QuantumRoutingManager};

/// The outcome of invoking the chosen model, if the orchestrator executed
/// the task rather than stopping at `debug_route`.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub response: ProviderResponse,
    pub retried: bool,
}

/// `OrchestrationResult` (spec §6): `{result, decision, metrics_snapshot?,
/// agent_trace?, error?}`.
#[derive(Debug, Clone, Default)]
pub struct OrchestrationResult {
    pub result: Option<TaskOutcome>,
    pub decision: Option<RoutingDecision>,
    pub metrics_snapshot: Option<Vec<crate::domain::MetricEvent>>,
    pub agent_trace: Option<Vec<String>>,
    pub error: Option<OrchestratorError>,
}

/// `DebugInfo` (spec §6) — routing decision plus scoring breakdown, no
/// execution.
#[derive(Debug, Clone)]
pub struct DebugInfo {
    pub routing_decision: RoutingDecision,
    pub scoring_breakdown: ScoringBreakdown,
    pub metadata: DebugMetadata,
}

#[derive(Debug, Clone)]
pub struct DebugMetadata {
    pub slash_command: Option<String>,
    pub context_type: crate::domain::ContextType,
    pub complexity_level: crate::domain::ComplexityLevel,
    pub model_scores: HashMap<String, f32>,
}

/// Wires every component together for one process/test (spec §4 overview).
/// Construct once at startup; cheap to clone the pieces it hands out
/// (`ModelRegistry` is `Clone`), but the context itself is meant to be held
/// behind an `Arc` and shared.
pub struct OrchestratorContext {
    pub registry: ModelRegistry,
    pub config: Config,
    pub cache: RoutingCache,
    pub metrics: MetricsCollector,
    pub agent_registry: AgentRegistry,
    pub bus: AgentBus,
    pool: WorkerPool,
    dqn: DqnHandle,
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl OrchestratorContext {
    pub fn new(
        config: Config,
        registry: ModelRegistry,
        providers: HashMap<String, Arc<dyn ProviderAdapter>>,
    ) -> Self {
        let pool = WorkerPool::new(config.worker_pool_size);
        Self {
            cache: RoutingCache::in_memory(config.routing_cache_capacity, config.routing_cache_ttl),
            metrics: MetricsCollector::new(config.metrics_ring_capacity),
            agent_registry: AgentRegistry::new(),
            bus: AgentBus::new(config.bus_queue_capacity),
            pool,
            dqn: Arc::new(AsyncRwLock::new(None)),
            registry,
            config,
            providers,
        }
    }

    /// Attaches a DQN agent built over this context's current action space.
    /// Safe to call again later (e.g. after a manifest reload); the new
    /// agent starts from a fresh network rather than trying to remap a
    /// stale one (spec §9 resolved Open Question).
    pub async fn install_dqn_agent(&self) {
        let agent = DqnAgent::new(
            Box::new(LinearQNetwork::new(self.registry.len())),
            self.config.replay_buffer_capacity,
            EpsilonSchedule::new(self.config.epsilon_start, self.config.epsilon_min, self.config.epsilon_decay),
            self.config.dqn_batch_size,
            self.config.dqn_gamma,
            self.config.dqn_target_update_interval,
            self.registry.action_space_hash(),
        );
        *self.dqn.write().await = Some(agent);
    }

    /// `debug_route(request) -> DebugInfo` (spec §6) — routes without
    /// executing anything against a provider.
    pub fn debug_route(&self, request: &Request) -> Result<DebugInfo> {
        let router = AdvancedRouter::new(&self.registry);
        let decision = router.route(request)?;

        let (complexity_level, _) = classify_complexity(request);
        let context_type = extract_context(request);
        let slash_command = request
            .prompt
            .split_whitespace()
            .next()
            .filter(|w| w.starts_with('/'))
            .map(|w| w.to_string());

        let model_scores = decision
            .metadata
            .get("model_scores")
            .and_then(|v| serde_json::from_value::<HashMap<String, f32>>(v.clone()).ok())
            .unwrap_or_default();

        Ok(DebugInfo {
            scoring_breakdown: decision.scoring_breakdown,
            metadata: DebugMetadata { slash_command, context_type, complexity_level, model_scores },
            routing_decision: decision,
        })
    }

    /// `orchestrate(request) -> OrchestrationResult` (spec §6) — routes,
    /// checks the cache, invokes the chosen provider (with at most one
    /// fallback hop on provider failure, spec §7), records metrics, and
    /// feeds the DQN agent an experience derived from the outcome.
    pub async fn orchestrate(&self, request: &Request) -> OrchestrationResult {
        let router = AdvancedRouter::new(&self.registry);

        let persona_for_key = {
            let (_, _ctype) = (extract_context(request), ());
            router.route(request).map(|d| format!("{:?}", d.persona)).unwrap_or_default()
        };
        let key = fingerprint(
            &normalize_prompt(&request.prompt),
            &format!("{:?}", request.task_type),
            request.language.as_deref(),
            &persona_for_key,
            request.provider_preference.as_deref(),
        );

        if let Some(cached) = self.cache.get(&key).await {
            self.metrics.record(MetricType::CacheHit, HashMap::new(), 1.0);
            return self.execute_decision(request, cached, false).await;
        }
        self.metrics.record(MetricType::CacheMiss, HashMap::new(), 1.0);

        let decision = match self.route_decision(request).await {
            Ok(d) => d,
            Err(err) => return OrchestrationResult { error: Some(err), ..Default::default() },
        };
        self.cache.put(&key, decision.clone()).await;

        self.execute_decision(request, decision, true).await
    }

    /// Routing step of `orchestrate()` (spec §2 data flow): when quantum
    /// routing is enabled, fans the request out across the Quantum Routing
    /// Manager's parallel strategies (one of which consults the installed
    /// DQN agent) and collapses them with `WEIGHTED`; otherwise falls
    /// straight through to a single synchronous `AdvancedRouter` call.
    async fn route_decision(&self, request: &Request) -> Result<RoutingDecision> {
        if !self.config.quantum_routing_enabled {
            return AdvancedRouter::new(&self.registry).route(request);
        }
        let manager = QuantumRoutingManager::new(&self.registry, self.pool.clone());
        manager
            .route(
                request,
                Some(self.dqn.clone()),
                None,
                CollapseStrategy::Weighted,
                self.config.quantum_global_timeout,
            )
            .await
    }

    async fn execute_decision(
        &self,
        request: &Request,
        decision: RoutingDecision,
        fresh: bool,
    ) -> OrchestrationResult {
        let started = Instant::now();
        let mut labels = HashMap::new();
        labels.insert("provider".to_string(), decision.provider.clone());
        labels.insert("strategy".to_string(), "advanced".to_string());

        let primary = self.invoke_provider(&decision, request).await;
        let (outcome, retried, final_decision) = match primary {
            Ok(response) => (Ok(response), false, decision.clone()),
            Err(first_err) if matches!(first_err, OrchestratorError::ProviderUnavailable(_) | OrchestratorError::Timeout(_) | OrchestratorError::RateLimited(_)) => {
                match self.fallback_decision(request, &decision) {
                    Some(fallback) => {
                        let retried_response = self.invoke_provider(&fallback, request).await;
                        match retried_response {
                            Ok(response) => (Ok(response), true, fallback),
                            Err(_) => (Err(first_err), true, decision.clone()),
                        }
                    }
                    None => (Err(first_err), false, decision.clone()),
                }
            }
            Err(other) => (Err(other), false, decision.clone()),
        };

        let elapsed_ms = started.elapsed().as_millis() as f64;
        self.metrics.record(MetricType::RoutingLatencyMs, labels.clone(), elapsed_ms);
        self.metrics.record(
            MetricType::RoutingDecision,
            labels,
            if outcome.is_ok() { 1.0 } else { 0.0 },
        );

        self.push_learning_experience(request, &final_decision, outcome.is_ok(), elapsed_ms).await;

        let _ = fresh;
        match outcome {
            Ok(response) => OrchestrationResult {
                result: Some(TaskOutcome { response, retried }),
                decision: Some(final_decision),
                metrics_snapshot: None,
                agent_trace: None,
                error: None,
            },
            Err(err) => OrchestrationResult {
                result: None,
                decision: Some(final_decision),
                metrics_snapshot: None,
                agent_trace: None,
                error: Some(err),
            },
        }
    }

    async fn invoke_provider(&self, decision: &RoutingDecision, request: &Request) -> Result<ProviderResponse> {
        let adapter = self
            .providers
            .get(&decision.provider)
            .ok_or_else(|| OrchestratorError::ProviderUnavailable(format!("no adapter registered for {}", decision.provider)))?;

        let token = CancellationToken::new();
        let params = InvokeParams { system: None, temperature: None, max_tokens: None };
        tokio::time::timeout(self.config.provider_timeout, adapter.invoke(&decision.model_id, &request.prompt, &params, &token))
            .await
            .unwrap_or_else(|_| Err(OrchestratorError::Timeout(self.config.provider_timeout)))
    }

    /// At most one fallback hop (spec §7): picks the next-best model that
    /// isn't the one that just failed. The failed model is excluded from
    /// candidacy outright rather than re-scored and rejected after the
    /// fact — it can otherwise out-score every alternative and leave the
    /// retry with nowhere to go.
    fn fallback_decision(&self, request: &Request, failed: &RoutingDecision) -> Option<RoutingDecision> {
        let router = AdvancedRouter::new(&self.registry);
        let mut retry_request = request.clone();
        retry_request.provider_preference = None;
        router
            .route_excluding(&retry_request, &[(failed.provider.clone(), failed.model_id.clone())])
            .ok()
    }

    async fn push_learning_experience(&self, request: &Request, decision: &RoutingDecision, success: bool, latency_ms: f64) {
        let mut dqn_guard = self.dqn.write().await;
        let Some(dqn) = dqn_guard.as_mut() else { return };
        if dqn.is_stale_for(&self.registry.action_space_hash()) {
            return;
        }
        let Some(action) = self.registry.action_for(&decision.provider, &decision.model_id) else { return };

        let providers = self.registry.providers_in_order(5);
        let availability = vec![true; providers.len()];
        let (_, complexity_score) = classify_complexity(request);
        let state_vec = state::encode(&StateContext {
            complexity_score,
            context_type: extract_context(request),
            provider_order: &providers,
            provider_availability: &availability,
            historical_success_rate: decision.confidence,
            normalized_cost_budget: 0.5,
            normalized_latency_budget: (latency_ms / 5000.0).clamp(0.0, 1.0) as f32,
            normalized_context_window_requirement: 0.5,
            preference_scalar: 0.0,
        });

        let reward = crate::learning::compose_reward(
            RewardWeights::default(),
            success,
            (latency_ms / 5000.0).clamp(0.0, 1.0) as f32,
            0.0,
            None,
        );

        dqn.push_experience(Experience {
            state: state_vec.clone(),
            action,
            reward,
            next_state: state_vec,
            done: true,
        });
        if let Some(loss) = dqn.learn() {
            self.metrics.record(MetricType::DqnLoss, HashMap::new(), loss as f64);
        }
    }
}

/// Normalizes whitespace for stable cache fingerprints — collapses runs of
/// whitespace and trims, without altering case (prompts are case-sensitive).
fn normalize_prompt(prompt: &str) -> String {
    prompt.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModelCapability, TaskType};
    use crate::provider::MockAdapter;

    fn sample_registry() -> ModelRegistry {
        ModelRegistry::from_models(vec![
            ModelCapability {
                provider: "mock".into(),
                model_id: "mock-1".into(),
                code_gen_score: 0.8,
                reasoning_score: 0.7,
                context_window: 8_000,
                latency_hint_ms: 100,
                cost_per_token_in: 0.000_001,
                cost_per_token_out: 0.000_002,
                reliability: 0.99,
                specializations: Default::default(),
            },
            ModelCapability {
                provider: "fallback".into(),
                model_id: "fallback-1".into(),
                code_gen_score: 0.6,
                reasoning_score: 0.6,
                context_window: 8_000,
                latency_hint_ms: 100,
                cost_per_token_in: 0.000_001,
                cost_per_token_out: 0.000_002,
                reliability: 0.9,
                specializations: Default::default(),
            },
        ])
        .unwrap()
    }

    fn context_with(providers: Vec<(&str, Arc<dyn ProviderAdapter>)>) -> OrchestratorContext {
        let map = providers.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        OrchestratorContext::new(Config::default(), sample_registry(), map)
    }

    #[tokio::test]
    async fn debug_route_never_executes_a_provider() {
        let ctx = context_with(vec![]);
        let req = Request::new("Write a function to add two numbers", TaskType::CodeGeneration);
        let info = ctx.debug_route(&req).unwrap();
        assert!((0.0..=1.0).contains(&info.routing_decision.confidence));
    }

    #[tokio::test]
    async fn orchestrate_returns_result_on_success() {
        let ctx = context_with(vec![
            ("mock", Arc::new(MockAdapter::new("mock", "hello"))),
            ("fallback", Arc::new(MockAdapter::new("fallback", "hello"))),
        ]);
        let req = Request::new("Write a function to add two numbers", TaskType::CodeGeneration);
        let result = ctx.orchestrate(&req).await;
        assert!(result.error.is_none());
        assert!(result.result.is_some());
    }

    #[tokio::test]
    async fn orchestrate_caches_decision_across_calls() {
        let ctx = context_with(vec![
            ("mock", Arc::new(MockAdapter::new("mock", "hello"))),
            ("fallback", Arc::new(MockAdapter::new("fallback", "hello"))),
        ]);
        let req = Request::new("Write a function to add two numbers", TaskType::CodeGeneration);
        let first = ctx.orchestrate(&req).await;
        let second = ctx.orchestrate(&req).await;
        assert_eq!(first.decision.unwrap().key(), second.decision.unwrap().key());
    }

    #[tokio::test]
    async fn orchestrate_falls_back_once_on_provider_failure() {
        let ctx = context_with(vec![
            ("mock", Arc::new(MockAdapter::new("mock", "hello").failing())),
            ("fallback", Arc::new(MockAdapter::new("fallback", "hello"))),
        ]);
        let mut req = Request::new("Write a function to add two numbers", TaskType::CodeGeneration);
        req.provider_preference = Some("mock".to_string());
        let result = ctx.orchestrate(&req).await;
        assert!(result.result.is_some(), "expected the fallback hop to succeed");
        assert!(result.result.unwrap().retried);
    }

    #[tokio::test]
    async fn orchestrate_surfaces_no_eligible_model() {
        let ctx = context_with(vec![]);
        let mut req = Request::new("anything", TaskType::CodeGeneration);
        req.provider_preference = Some("does-not-exist".to_string());
        let result = ctx.orchestrate(&req).await;
        assert!(matches!(result.error, Some(OrchestratorError::NoEligibleModel(_))));
    }
}
