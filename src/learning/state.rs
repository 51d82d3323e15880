//! The fixed 21-dim state vector layout (spec §4.F table). Encoding lives
//! in one place so the DQN agent, the Quantum Routing Manager's
//! `LEARNING_OPTIMIZED` strategy, and tests all agree on dimension order.

use crate::domain::{ContextType, STATE_DIM};

/// Inputs needed to build one state vector. Borrowed rather than owned —
/// callers assemble this from a `Request`, the registry, and rolling
/// history just before invoking the agent.
pub struct StateContext<'a> {
    pub complexity_score: f32,
    pub context_type: ContextType,
    /// First five providers in registry order (spec §4.F: "only the first
    /// 5 contribute here").
    pub provider_order: &'a [String],
    /// Availability flags parallel to `provider_order`.
    pub provider_availability: &'a [bool],
    pub historical_success_rate: f32,
    pub normalized_cost_budget: f32,
    pub normalized_latency_budget: f32,
    pub normalized_context_window_requirement: f32,
    /// -1 (cost-preferring) .. +1 (quality-preferring).
    pub preference_scalar: f32,
}

/// Builds the fixed-layout 21-dim state vector (spec §4.F table).
pub fn encode(ctx: &StateContext<'_>) -> Vec<f32> {
    let mut state = vec![0.0_f32; STATE_DIM];

    state[0] = ctx.complexity_score.clamp(0.0, 1.0);

    let slot = ctx.context_type.slot_index();
    state[1 + slot] = 1.0;

    for i in 0..5 {
        state[11 + i] = ctx.provider_availability.get(i).copied().unwrap_or(false) as u8 as f32;
    }

    state[16] = ctx.historical_success_rate.clamp(0.0, 1.0);
    state[17] = ctx.normalized_cost_budget.clamp(0.0, 1.0);
    state[18] = ctx.normalized_latency_budget.clamp(0.0, 1.0);
    state[19] = ctx.normalized_context_window_requirement.clamp(0.0, 1.0);
    state[20] = ctx.preference_scalar.clamp(-1.0, 1.0);

    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_to_fixed_length() {
        let ctx = StateContext {
            complexity_score: 0.4,
            context_type: ContextType::Debugging,
            provider_order: &["openai".to_string(), "anthropic".to_string()],
            provider_availability: &[true, false],
            historical_success_rate: 0.8,
            normalized_cost_budget: 0.2,
            normalized_latency_budget: 0.3,
            normalized_context_window_requirement: 0.1,
            preference_scalar: -0.5,
        };
        let state = encode(&ctx);
        assert_eq!(state.len(), STATE_DIM);
        assert_eq!(state[0], 0.4);
        assert_eq!(state[1 + ContextType::Debugging.slot_index()], 1.0);
        assert_eq!(state[11], 1.0);
        assert_eq!(state[12], 0.0);
        assert_eq!(state[20], -0.5);
    }

    #[test]
    fn unused_provider_slots_are_zero_filled() {
        let ctx = StateContext {
            complexity_score: 0.1,
            context_type: ContextType::General,
            provider_order: &["only-one".to_string()],
            provider_availability: &[true],
            historical_success_rate: 0.5,
            normalized_cost_budget: 0.5,
            normalized_latency_budget: 0.5,
            normalized_context_window_requirement: 0.5,
            preference_scalar: 0.0,
        };
        let state = encode(&ctx);
        assert_eq!(&state[11..16], &[1.0, 0.0, 0.0, 0.0, 0.0]);
    }
}
