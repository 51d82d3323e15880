//! Quantum Routing Manager (spec §4.G) — runs a subset of `RoutingStrategy`
//! values in parallel via the Quantum Executor and collapses them into a
//! single `RoutingDecision`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::domain::{CollapseStrategy, Request, RoutingDecision, RoutingStrategy};
use crate::error::Result;
use crate::learning::{state, DqnAgent, StateContext};
use crate::quantum::{execute_quantum_task, CollapseOutcome, TaskVariation, WorkerPool};
use crate::registry::ModelRegistry;
use crate::router::advanced::{AdvancedRouter, ScoringWeights};
use crate::router::{classify_complexity, extract_context};

const DEFAULT_STRATEGIES: [RoutingStrategy; 5] = RoutingStrategy::ALL;

/// Shared handle to the process's DQN agent, read for action selection and
/// written by the learning loop (spec §4.F). `None` inside the lock means no
/// agent has been installed yet.
pub type DqnHandle = Arc<RwLock<Option<DqnAgent>>>;

/// `route(request, strategies?, collapse?) -> RoutingDecision` (spec §4.G).
pub struct QuantumRoutingManager<'a> {
    registry: &'a ModelRegistry,
    pool: WorkerPool,
}

impl<'a> QuantumRoutingManager<'a> {
    pub fn new(registry: &'a ModelRegistry, pool: WorkerPool) -> Self {
        Self { registry, pool }
    }

    pub async fn route(
        &self,
        request: &Request,
        dqn: Option<DqnHandle>,
        strategies: Option<&[RoutingStrategy]>,
        collapse_strategy: CollapseStrategy,
        global_timeout: Duration,
    ) -> Result<RoutingDecision> {
        let strategies = strategies.unwrap_or(&DEFAULT_STRATEGIES);

        let variations: Vec<TaskVariation<RoutingDecision>> = strategies
            .iter()
            .map(|strategy| self.variation_for(*strategy, request, dqn.clone()))
            .collect();

        let outcome = execute_quantum_task(
            variations,
            collapse_strategy,
            Some(Box::new(|decision: &RoutingDecision| decision.confidence)),
            Some(global_timeout),
            &self.pool,
        )
        .await;

        match outcome {
            CollapseOutcome::Single { winner, .. } => match winner.value {
                Some(decision) => Ok(decision),
                None => self.fallback(request),
            },
            CollapseOutcome::Combined { primary, .. } => match primary.value {
                Some(decision) => Ok(decision),
                None => self.fallback(request),
            },
            CollapseOutcome::AllFailed { .. } => self.fallback(request),
        }
    }

    fn variation_for(&self, strategy: RoutingStrategy, request: &Request, dqn: Option<DqnHandle>) -> TaskVariation<RoutingDecision> {
        let request = request.clone();
        let registry_snapshot = self.registry.clone();
        let prior_weight = strategy.default_prior_weight();

        TaskVariation::new(format!("{strategy:?}"), move |_cancellation| {
            let request = request;
            let registry_snapshot = registry_snapshot;
            async move {
                let router = AdvancedRouter::new(&registry_snapshot);
                let mut decision = match strategy {
                    RoutingStrategy::TaskOptimized => router.route_with_weights(&request, None)?,
                    RoutingStrategy::PerformanceFocused => {
                        router.route_with_weights(&request, Some(ScoringWeights::PERFORMANCE_FOCUSED))?
                    }
                    RoutingStrategy::Balanced => router.route_with_weights(&request, Some(ScoringWeights::BALANCED))?,
                    RoutingStrategy::CostEfficient => {
                        router.route_with_weights(&request, Some(ScoringWeights::COST_EFFICIENT))?
                    }
                    RoutingStrategy::LearningOptimized => {
                        learned_decision(&router, &registry_snapshot, &request, dqn.as_ref()).await?
                    }
                };
                decision.metadata.insert(
                    "strategy_prior_weight".to_string(),
                    serde_json::json!(prior_weight),
                );
                decision.confidence = (decision.confidence * prior_weight).min(1.0);
                Ok(decision)
            }
        })
        .with_params(serde_json::Map::new())
    }

    /// Fallback to a single synchronous `BALANCED` call, with
    /// `fallback=true` attached (spec §4.G).
    fn fallback(&self, request: &Request) -> Result<RoutingDecision> {
        let router = AdvancedRouter::new(self.registry);
        let mut decision = router.route_with_weights(request, Some(ScoringWeights::BALANCED))?;
        decision.metadata.insert("fallback".to_string(), serde_json::json!(true));
        Ok(decision)
    }
}

/// Builds the DQN state vector for a request against the registry's
/// first-five-provider ordering (spec §4.F), for callers wiring up the
/// `LEARNING_OPTIMIZED` strategy themselves.
pub fn state_for_request(registry: &ModelRegistry, request: &Request, preference_scalar: f32) -> Vec<f32> {
    let (_, complexity_score) = classify_complexity(request);
    let context_type = extract_context(request);
    let providers = registry.providers_in_order(5);
    let availability = vec![true; providers.len()];

    let ctx = StateContext {
        complexity_score,
        context_type,
        provider_order: &providers,
        provider_availability: &availability,
        historical_success_rate: 0.5,
        normalized_cost_budget: 0.5,
        normalized_latency_budget: 0.5,
        normalized_context_window_requirement: 0.5,
        preference_scalar,
    };
    state::encode(&ctx)
}

/// The `LEARNING_OPTIMIZED` strategy body (spec §4.G): encode the request's
/// state vector, ask the installed DQN agent for a masked ε-greedy action,
/// and wrap the decoded `(provider, model_id)` into a `RoutingDecision`.
/// Falls back to the task-optimized `AdvancedRouter` profile whenever no
/// agent is installed or the agent is stale against the live action space —
/// this is the only strategy whose variation can be a no-op by design.
async fn learned_decision(
    router: &AdvancedRouter<'_>,
    registry: &ModelRegistry,
    request: &Request,
    dqn: Option<&DqnHandle>,
) -> Result<RoutingDecision> {
    let Some(handle) = dqn else {
        return router.route_with_weights(request, None);
    };
    let guard = handle.read().await;
    let Some(agent) = guard.as_ref() else {
        return router.route_with_weights(request, None);
    };
    if agent.is_stale_for(&registry.action_space_hash()) {
        return router.route_with_weights(request, None);
    }

    let state_vec = state_for_request(registry, request, 0.0);
    let mask = action_mask(registry, request);
    if !mask.iter().any(|available| *available) {
        return router.route_with_weights(request, None);
    }
    let action = agent.select_action(&state_vec, &mask);
    let epsilon = agent.epsilon();
    drop(guard);

    match registry.decode_action(action) {
        Some((provider, model_id)) => router.route_fixed_model(request, provider, model_id, 1.0 - epsilon),
        None => router.route_with_weights(request, None),
    }
}

/// Masks the action space down to `request.provider_preference` when set,
/// mirroring the hard provider filter the `AdvancedRouter` applies in step 4
/// (spec §4.C) so a learned action never contradicts an explicit request.
fn action_mask(registry: &ModelRegistry, request: &Request) -> Vec<bool> {
    match &request.provider_preference {
        Some(preferred) => registry.action_space().iter().map(|(provider, _)| provider == preferred).collect(),
        None => vec![true; registry.len()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModelCapability, TaskType};
    use crate::learning::{DqnAgent, EpsilonSchedule, LinearQNetwork};

    fn registry() -> ModelRegistry {
        ModelRegistry::from_models(vec![
            ModelCapability {
                provider: "anthropic".into(),
                model_id: "claude-fast".into(),
                code_gen_score: 0.7,
                reasoning_score: 0.6,
                context_window: 100_000,
                latency_hint_ms: 300,
                cost_per_token_in: 0.000_001,
                cost_per_token_out: 0.000_002,
                reliability: 0.95,
                specializations: Default::default(),
            },
            ModelCapability {
                provider: "openai".into(),
                model_id: "gpt-reasoner".into(),
                code_gen_score: 0.9,
                reasoning_score: 0.95,
                context_window: 200_000,
                latency_hint_ms: 1200,
                cost_per_token_in: 0.00002,
                cost_per_token_out: 0.00006,
                reliability: 0.97,
                specializations: Default::default(),
            },
        ])
        .unwrap()
    }

    fn installed_agent(registry: &ModelRegistry) -> DqnHandle {
        Arc::new(RwLock::new(Some(DqnAgent::new(
            Box::new(LinearQNetwork::new(registry.len())),
            100,
            EpsilonSchedule::new(0.0, 0.0, 1.0),
            32,
            0.9,
            10,
            registry.action_space_hash(),
        ))))
    }

    #[tokio::test]
    async fn manager_collapses_strategies_into_one_registered_decision() {
        let reg = registry();
        let manager = QuantumRoutingManager::new(&reg, WorkerPool::new(4));
        let req = Request::new("Write a function to reverse a string", TaskType::CodeGeneration);
        let decision = manager
            .route(&req, None, None, CollapseStrategy::Weighted, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(reg.get(&decision.provider, &decision.model_id).is_some());
    }

    #[tokio::test]
    async fn learning_optimized_falls_back_without_an_installed_agent() {
        let reg = registry();
        let manager = QuantumRoutingManager::new(&reg, WorkerPool::new(4));
        let req = Request::new("Write a function to reverse a string", TaskType::CodeGeneration);
        let decision = manager
            .route(
                &req,
                None,
                Some(&[RoutingStrategy::LearningOptimized]),
                CollapseStrategy::BestScore,
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert!(reg.get(&decision.provider, &decision.model_id).is_some());
    }

    #[tokio::test]
    async fn learning_optimized_consults_the_installed_agent() {
        let reg = registry();
        let dqn = installed_agent(&reg);
        let manager = QuantumRoutingManager::new(&reg, WorkerPool::new(4));
        let req = Request::new("Write a function to reverse a string", TaskType::CodeGeneration);
        let decision = manager
            .route(
                &req,
                Some(dqn),
                Some(&[RoutingStrategy::LearningOptimized]),
                CollapseStrategy::BestScore,
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(decision.metadata.get("source").and_then(|v| v.as_str()), Some("learned_policy"));
        assert!(reg.get(&decision.provider, &decision.model_id).is_some());
    }

    #[tokio::test]
    async fn learning_optimized_respects_provider_preference_mask() {
        let reg = registry();
        let dqn = installed_agent(&reg);
        let manager = QuantumRoutingManager::new(&reg, WorkerPool::new(4));
        let mut req = Request::new("Write a function to reverse a string", TaskType::CodeGeneration);
        req.provider_preference = Some("anthropic".to_string());
        let decision = manager
            .route(
                &req,
                Some(dqn),
                Some(&[RoutingStrategy::LearningOptimized]),
                CollapseStrategy::BestScore,
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(decision.provider, "anthropic");
    }
}
