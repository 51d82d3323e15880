//! Advanced Router (spec §4.C) — complexity/context/capability scoring and
//! model + persona selection.

use std::collections::HashMap;

use crate::domain::{ComplexityLevel, ContextType, ModelCapability, Request, RoutingDecision, ScoringBreakdown};
use crate::error::{OrchestratorError, Result};
use crate::registry::{ModelFilter, ModelRegistry};

use super::complexity::classify_complexity;
use super::context::extract_context;
use super::persona::select_persona;

/// Scoring weights for capability-score step 3. Varies by routing
/// preference (spec §4.C: "Weights depend on routing preferences").
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub w_capability: f32,
    pub w_context: f32,
    pub w_cost: f32,
    pub w_latency: f32,
    pub w_reliability: f32,
}

impl ScoringWeights {
    pub const BALANCED: ScoringWeights = ScoringWeights {
        w_capability: 0.4,
        w_context: 0.2,
        w_cost: 0.15,
        w_latency: 0.15,
        w_reliability: 0.1,
    };
    pub const COST_EFFICIENT: ScoringWeights = ScoringWeights {
        w_capability: 0.25,
        w_context: 0.15,
        w_cost: 0.4,
        w_latency: 0.1,
        w_reliability: 0.1,
    };
    pub const PERFORMANCE_FOCUSED: ScoringWeights = ScoringWeights {
        w_capability: 0.5,
        w_context: 0.2,
        w_cost: 0.0,
        w_latency: 0.2,
        w_reliability: 0.1,
    };

    pub fn for_preferences(preferences: &crate::domain::Preferences) -> Self {
        if preferences.performance_focused {
            Self::PERFORMANCE_FOCUSED
        } else if preferences.cost_efficient {
            Self::COST_EFFICIENT
        } else {
            Self::BALANCED
        }
    }
}

/// Bonus added to a model's capability score when the selected persona
/// prefers the extracted context type / complexity band (resolved Open
/// Question, see SPEC_FULL.md §4.C). Advisory, never a filter.
const PERSONA_CONTEXT_BONUS: f32 = 0.05;
const PERSONA_COMPLEXITY_BONUS: f32 = 0.03;

pub struct AdvancedRouter<'a> {
    registry: &'a ModelRegistry,
}

impl<'a> AdvancedRouter<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self { registry }
    }

    /// `route(request) -> RoutingDecision` (spec §4.C).
    pub fn route(&self, request: &Request) -> Result<RoutingDecision> {
        self.route_with_weights(request, None)
    }

    /// Same algorithm, but with an explicit weight override — used by the
    /// Quantum Routing Manager's `TASK_OPTIMIZED`/`PERFORMANCE_FOCUSED`/
    /// `COST_EFFICIENT` strategies, which all reduce to this router under a
    /// different weighting (spec §4.G).
    pub fn route_with_weights(&self, request: &Request, weights_override: Option<ScoringWeights>) -> Result<RoutingDecision> {
        self.route_impl(request, weights_override, &[])
    }

    /// Same algorithm, excluding a fixed set of `(provider, model_id)` pairs
    /// from candidacy entirely — used by the retry hop after a provider
    /// failure (spec §7), so the fallback can never re-select the model that
    /// just failed even when it would otherwise still score highest.
    pub fn route_excluding(&self, request: &Request, exclude: &[(String, String)]) -> Result<RoutingDecision> {
        self.route_impl(request, None, exclude)
    }

    fn route_impl(
        &self,
        request: &Request,
        weights_override: Option<ScoringWeights>,
        exclude: &[(String, String)],
    ) -> Result<RoutingDecision> {
        let (complexity, complexity_score) = classify_complexity(request);
        let context_type = extract_context(request);
        let weights = weights_override.unwrap_or_else(|| ScoringWeights::for_preferences(&request.preferences));

        let (persona, effective_prompt) = select_persona(request, context_type, complexity);
        let _ = effective_prompt; // carried in metadata below

        let mut candidates = self.registry.list_models(self.provider_filter(request).as_ref());
        if !exclude.is_empty() {
            candidates.retain(|m| !exclude.iter().any(|(p, id)| p == &m.provider && id == &m.model_id));
        }
        if candidates.is_empty() {
            return Err(OrchestratorError::NoEligibleModel(
                "no models available under the requested provider filter".to_string(),
            ));
        }

        let mut within_floor: Vec<&ModelCapability> = candidates
            .iter()
            .copied()
            .filter(|m| !complexity.requires_floor_check() || self.capability_fit(m, context_type) >= complexity.capability_floor())
            .collect();

        let allow_downgrade = request.preferences.allow_downgrade;
        let (pool, downgraded) = if within_floor.is_empty() {
            if complexity.requires_floor_check() && !allow_downgrade {
                return Err(OrchestratorError::NoEligibleModel(format!(
                    "no candidate clears the {complexity:?} capability floor ({:.2}); set allow_downgrade to relax this",
                    complexity.capability_floor()
                )));
            }
            (std::mem::take(&mut candidates), true)
        } else {
            (std::mem::take(&mut within_floor), false)
        };

        let mut scored: Vec<(f32, &ModelCapability, ScoringBreakdown)> = pool
            .into_iter()
            .map(|m| {
                let capability_fit = self.capability_fit(m, context_type);
                let context_fit = self.context_fit(m, context_type);
                let normalized_cost = self.normalized_cost(m);
                let normalized_latency = self.normalized_latency(m);

                let mut capability_fit = capability_fit;
                if persona.preferred_context_types.contains(&context_type.key()) {
                    capability_fit += PERSONA_CONTEXT_BONUS;
                }
                if persona.preferred_complexity.contains(&complexity.key()) {
                    capability_fit += PERSONA_COMPLEXITY_BONUS;
                }

                let score = weights.w_capability * capability_fit + weights.w_context * context_fit
                    - weights.w_cost * normalized_cost
                    - weights.w_latency * normalized_latency
                    + weights.w_reliability * m.reliability;

                let breakdown = ScoringBreakdown {
                    complexity: complexity_score,
                    context: context_fit,
                    capability: capability_fit.clamp(0.0, 1.0),
                };
                (score, m, breakdown)
            })
            .collect();

        // Selection: argmax, ties broken by higher reliability, then lower
        // cost, then lexicographic (provider, model_id) (spec §4.C step 5).
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap()
                .then_with(|| b.1.reliability.partial_cmp(&a.1.reliability).unwrap())
                .then_with(|| {
                    (a.1.cost_per_token_in + a.1.cost_per_token_out)
                        .partial_cmp(&(b.1.cost_per_token_in + b.1.cost_per_token_out))
                        .unwrap()
                })
                .then_with(|| (a.1.provider.as_str(), a.1.model_id.as_str()).cmp(&(b.1.provider.as_str(), b.1.model_id.as_str())))
        });

        let (best_score, best_model, breakdown) = scored[0];
        let second_best_score = scored.get(1).map(|s| s.0).unwrap_or(best_score - 1.0);

        let confidence = if downgraded {
            sigmoid_confidence(best_score, second_best_score).min(0.5)
        } else {
            sigmoid_confidence(best_score, second_best_score)
        };

        let reasoning = if downgraded {
            format!(
                "No model cleared the {complexity:?} capability floor ({:.2}); downgraded to the best available candidate {}/{} (score {:.3}).",
                complexity.capability_floor(),
                best_model.provider,
                best_model.model_id,
                best_score
            )
        } else {
            format!(
                "Selected {}/{} for a {complexity:?} {context_type:?} request (score {:.3}, margin over runner-up {:.3}).",
                best_model.provider,
                best_model.model_id,
                best_score,
                best_score - second_best_score
            )
        };

        let mut metadata = HashMap::new();
        metadata.insert("effective_prompt".to_string(), serde_json::json!(effective_prompt));
        metadata.insert("downgraded".to_string(), serde_json::json!(downgraded));
        metadata.insert("model_scores".to_string(), serde_json::json!(scored.iter().map(|(s, m, _)| (format!("{}/{}", m.provider, m.model_id), *s)).collect::<HashMap<_, _>>()));

        Ok(RoutingDecision {
            provider: best_model.provider.clone(),
            model_id: best_model.model_id.clone(),
            persona: persona.id,
            confidence,
            reasoning,
            scoring_breakdown: breakdown,
            metadata,
        })
    }

    /// Builds a `RoutingDecision` around a model already chosen by some
    /// other policy (the DQN agent's `LEARNING_OPTIMIZED` strategy, spec
    /// §4.G) rather than by this router's own argmax. Persona selection and
    /// the scoring breakdown still run so the decision carries the same
    /// shape as one produced by [`route_with_weights`]; `confidence` is
    /// supplied by the caller (the agent's own greedy-vs-exploring signal).
    pub fn route_fixed_model(&self, request: &Request, provider: &str, model_id: &str, confidence: f32) -> Result<RoutingDecision> {
        let model = self.registry.get(provider, model_id).ok_or_else(|| {
            OrchestratorError::NoEligibleModel(format!("{provider}/{model_id} is not in the registry"))
        })?;
        let (complexity, complexity_score) = classify_complexity(request);
        let context_type = extract_context(request);
        let (persona, effective_prompt) = select_persona(request, context_type, complexity);

        let context_fit = self.context_fit(model, context_type);
        let capability_fit = self.capability_fit(model, context_type).clamp(0.0, 1.0);

        let mut metadata = HashMap::new();
        metadata.insert("effective_prompt".to_string(), serde_json::json!(effective_prompt));
        metadata.insert("source".to_string(), serde_json::json!("learned_policy"));

        Ok(RoutingDecision {
            provider: model.provider.clone(),
            model_id: model.model_id.clone(),
            persona: persona.id,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: format!(
                "Learned policy selected {}/{} for a {complexity:?} {context_type:?} request.",
                model.provider, model.model_id
            ),
            scoring_breakdown: ScoringBreakdown { complexity: complexity_score, context: context_fit, capability: capability_fit },
            metadata,
        })
    }

    fn provider_filter(&self, request: &Request) -> Option<ModelFilter> {
        request.provider_preference.clone().map(|provider| ModelFilter {
            provider: Some(provider),
            ..Default::default()
        })
    }

    /// How well a model's raw capability fits the task (task-type-weighted
    /// blend of code-gen and reasoning score).
    fn capability_fit(&self, model: &ModelCapability, context_type: ContextType) -> f32 {
        match context_type {
            ContextType::CodeGeneration | ContextType::Refactoring | ContextType::Testing => {
                0.7 * model.code_gen_score + 0.3 * model.reasoning_score
            }
            ContextType::Architecture | ContextType::Security | ContextType::Debugging => {
                0.3 * model.code_gen_score + 0.7 * model.reasoning_score
            }
            _ => 0.5 * model.code_gen_score + 0.5 * model.reasoning_score,
        }
    }

    /// How well a model's declared specializations match the context.
    fn context_fit(&self, model: &ModelCapability, context_type: ContextType) -> f32 {
        let tag = context_tag(context_type);
        if model.specializations.contains(tag) {
            1.0
        } else if model.specializations.is_empty() {
            0.5
        } else {
            0.3
        }
    }

    fn normalized_cost(&self, model: &ModelCapability) -> f32 {
        let total = model.cost_per_token_in + model.cost_per_token_out;
        // Reference ceiling chosen so typical frontier-model pricing maps
        // into [0,1]; costs above it simply saturate.
        (total / 0.0001).clamp(0.0, 1.0) as f32
    }

    fn normalized_latency(&self, model: &ModelCapability) -> f32 {
        (model.latency_hint_ms as f32 / 5000.0).clamp(0.0, 1.0)
    }
}

fn context_tag(context_type: ContextType) -> &'static str {
    match context_type {
        ContextType::CodeGeneration => "code_generation",
        ContextType::Debugging => "debugging",
        ContextType::Architecture => "architecture",
        ContextType::Security => "security",
        ContextType::Performance => "performance",
        ContextType::Testing => "testing",
        ContextType::Documentation => "documentation",
        ContextType::Review => "review",
        ContextType::Refactoring => "refactoring",
        ContextType::General => "general",
    }
}

/// `confidence = sigmoid(score_gap_to_second_best * k)` clipped to `[0,1]`
/// (spec §4.C step 7).
fn sigmoid_confidence(best: f32, second_best: f32) -> f32 {
    const K: f32 = 40.0;
    let gap = best - second_best;
    let sigmoid = 1.0 / (1.0 + (-K * gap).exp());
    sigmoid.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;

    fn registry() -> ModelRegistry {
        ModelRegistry::from_models(vec![
            ModelCapability {
                provider: "anthropic".into(),
                model_id: "claude-fast".into(),
                code_gen_score: 0.6,
                reasoning_score: 0.5,
                context_window: 100_000,
                latency_hint_ms: 300,
                cost_per_token_in: 0.000_001,
                cost_per_token_out: 0.000_002,
                reliability: 0.95,
                specializations: Default::default(),
            },
            ModelCapability {
                provider: "openai".into(),
                model_id: "gpt-architect".into(),
                code_gen_score: 0.85,
                reasoning_score: 0.95,
                context_window: 200_000,
                latency_hint_ms: 1500,
                cost_per_token_in: 0.00002,
                cost_per_token_out: 0.00006,
                reliability: 0.97,
                specializations: ["architecture".to_string()].into_iter().collect(),
            },
            ModelCapability {
                provider: "google".into(),
                model_id: "gemini-flash".into(),
                code_gen_score: 0.5,
                reasoning_score: 0.4,
                context_window: 64_000,
                latency_hint_ms: 200,
                cost_per_token_in: 0.000_0005,
                cost_per_token_out: 0.000_001,
                reliability: 0.9,
                specializations: Default::default(),
            },
        ])
        .unwrap()
    }

    #[test]
    fn decision_always_references_a_registered_model() {
        let reg = registry();
        let router = AdvancedRouter::new(&reg);
        let req = Request::new("Write a function to reverse a string", TaskType::CodeGeneration);
        let decision = router.route(&req).unwrap();
        assert!(reg.get(&decision.provider, &decision.model_id).is_some());
        assert!((0.0..=1.0).contains(&decision.confidence));
        assert!((0.0..=1.0).contains(&decision.scoring_breakdown.complexity));
        assert!((0.0..=1.0).contains(&decision.scoring_breakdown.context));
        assert!((0.0..=1.0).contains(&decision.scoring_breakdown.capability));
    }

    #[test]
    fn slash_command_precedence_scenario() {
        // Scenario 1 from spec §8.
        let reg = registry();
        let router = AdvancedRouter::new(&reg);
        let req = Request::new(
            "/arch Design a scalable microservices architecture for chat",
            TaskType::Custom,
        );
        let decision = router.route(&req).unwrap();
        assert_eq!(decision.persona, crate::domain::PersonaId::Architect);
        // Highest-reasoning-score model with the "architecture" specialization
        // should win here.
        assert_eq!(decision.provider, "openai");
        assert_eq!(decision.model_id, "gpt-architect");
    }

    #[test]
    fn trivial_task_cost_sensitivity_scenario() {
        // Scenario 2 from spec §8.
        let reg = registry();
        let router = AdvancedRouter::new(&reg);
        let mut req = Request::new("Write a Python function to add two numbers", TaskType::CodeGeneration);
        req.preferences.cost_efficient = true;
        let decision = router.route(&req).unwrap();
        let chosen = reg.get(&decision.provider, &decision.model_id).unwrap();
        let mut costs: Vec<f64> = reg
            .list_models(None)
            .iter()
            .map(|m| m.cost_per_token_in + m.cost_per_token_out)
            .collect();
        costs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let median = costs[costs.len() / 2];
        assert!(chosen.cost_per_token_in + chosen.cost_per_token_out <= median);
        assert!(decision.confidence >= 0.6, "confidence was {}", decision.confidence);
    }

    #[test]
    fn empty_registry_filter_fails_with_no_eligible_model() {
        let reg = registry();
        let router = AdvancedRouter::new(&reg);
        let mut req = Request::new("anything", TaskType::CodeGeneration);
        req.provider_preference = Some("does-not-exist".to_string());
        let err = router.route(&req).unwrap_err();
        assert!(matches!(err, OrchestratorError::NoEligibleModel(_)));
    }

    #[test]
    fn route_fixed_model_wraps_an_externally_chosen_action() {
        let reg = registry();
        let router = AdvancedRouter::new(&reg);
        let req = Request::new("Write a function to reverse a string", TaskType::CodeGeneration);
        let decision = router.route_fixed_model(&req, "google", "gemini-flash", 0.73).unwrap();
        assert_eq!(decision.provider, "google");
        assert_eq!(decision.model_id, "gemini-flash");
        assert_eq!(decision.confidence, 0.73);
    }

    #[test]
    fn route_fixed_model_rejects_an_unregistered_model() {
        let reg = registry();
        let router = AdvancedRouter::new(&reg);
        let req = Request::new("anything", TaskType::CodeGeneration);
        let err = router.route_fixed_model(&req, "nobody", "nothing", 0.5).unwrap_err();
        assert!(matches!(err, OrchestratorError::NoEligibleModel(_)));
    }

    #[test]
    fn provider_preference_is_respected() {
        let reg = registry();
        let router = AdvancedRouter::new(&reg);
        let mut req = Request::new("Write a function", TaskType::CodeGeneration);
        req.provider_preference = Some("google".to_string());
        let decision = router.route(&req).unwrap();
        assert_eq!(decision.provider, "google");
    }
}
