//! DQN Routing Agent (spec §4.F) — learns a policy mapping the 21-dim
//! state vector to a discrete action over the model registry's action
//! space. Grounded on the teacher's `agent/rl.rs` (`Experience`,
//! `ExperienceBuffer`, `PolicyOptimizer`) generalized from a GRPO text
//! policy to a tabular/linear-or-neural Q-learning agent over routing
//! actions.

pub mod network;
pub mod replay;
pub mod state;

pub use network::{LinearQNetwork, QNetwork};
pub use replay::ReplayBuffer;
pub use state::StateContext;

use rand::Rng;

use crate::domain::Experience;

/// ε-greedy hyperparameters (spec §4.F defaults).
#[derive(Debug, Clone, Copy)]
pub struct EpsilonSchedule {
    pub epsilon: f32,
    pub epsilon_min: f32,
    pub epsilon_decay: f32,
}

impl EpsilonSchedule {
    pub fn new(epsilon_start: f32, epsilon_min: f32, epsilon_decay: f32) -> Self {
        Self { epsilon: epsilon_start, epsilon_min, epsilon_decay }
    }

    /// Geometric decay towards `epsilon_min`, applied once per learning update.
    pub fn decay(&mut self) {
        self.epsilon = (self.epsilon * self.epsilon_decay).max(self.epsilon_min);
    }
}

/// Reward weights for the composed signal (spec §4.F).
#[derive(Debug, Clone, Copy)]
pub struct RewardWeights {
    pub success: f32,
    pub latency_penalty: f32,
    pub cost_penalty: f32,
    pub quality: f32,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self { success: 1.0, latency_penalty: 0.5, cost_penalty: 0.5, quality: 0.5 }
    }
}

/// Composes the reward signal at request completion (spec §4.F): success
/// indicator, normalized latency/cost penalties, optional downstream
/// quality score, clipped to `[-2, 2]`.
pub fn compose_reward(
    weights: RewardWeights,
    success: bool,
    normalized_latency: f32,
    normalized_cost: f32,
    quality_score: Option<f32>,
) -> f32 {
    let success_term = if success { weights.success } else { -weights.success };
    let latency_term = -weights.latency_penalty * normalized_latency;
    let cost_term = -weights.cost_penalty * normalized_cost;
    let quality_term = quality_score.map(|q| weights.quality * q).unwrap_or(0.0);
    (success_term + latency_term + cost_term + quality_term).clamp(-2.0, 2.0)
}

/// The DQN Routing Agent: online/target network pair, replay buffer, and
/// ε-greedy action selection with availability masking.
pub struct DqnAgent {
    online: Box<dyn QNetwork>,
    target: Box<dyn QNetwork>,
    replay: ReplayBuffer,
    epsilon: EpsilonSchedule,
    batch_size: usize,
    gamma: f32,
    target_update_interval: u32,
    updates_since_sync: u32,
    action_space_hash: String,
}

impl DqnAgent {
    pub fn new(
        mut online: Box<dyn QNetwork>,
        replay_capacity: usize,
        epsilon: EpsilonSchedule,
        batch_size: usize,
        gamma: f32,
        target_update_interval: u32,
        action_space_hash: String,
    ) -> Self {
        let target = online.clone_network();
        online.init();
        Self {
            online,
            target,
            replay: ReplayBuffer::new(replay_capacity),
            epsilon,
            batch_size,
            gamma,
            target_update_interval,
            updates_since_sync: 0,
            action_space_hash,
        }
    }

    /// Resolved Open Question (SPEC_FULL §9): if the registry's action
    /// space hash no longer matches the one this agent was constructed
    /// with, any persisted policy is stale and must be discarded rather
    /// than partially remapped.
    pub fn is_stale_for(&self, current_action_space_hash: &str) -> bool {
        self.action_space_hash != current_action_space_hash
    }

    /// ε-greedy action selection with unavailable actions masked out
    /// (forced to `-inf` before argmax) as required by spec §4.F.
    pub fn select_action(&self, state: &[f32], available: &[bool]) -> usize {
        let mut rng = rand::thread_rng();
        let available_indices: Vec<usize> =
            available.iter().enumerate().filter(|(_, a)| **a).map(|(i, _)| i).collect();
        if available_indices.is_empty() {
            return 0;
        }
        if rng.gen::<f32>() < self.epsilon.epsilon {
            return available_indices[rng.gen_range(0..available_indices.len())];
        }
        let q_values = self.online.predict(state);
        available_indices
            .into_iter()
            .max_by(|&a, &b| q_values[a].partial_cmp(&q_values[b]).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or(0)
    }

    pub fn push_experience(&mut self, experience: Experience) {
        self.replay.push(experience);
    }

    /// Samples a batch (if the buffer has reached `batch_size`) and
    /// performs one update step, syncing online -> target every
    /// `target_update_interval` updates (spec §4.F).
    pub fn learn(&mut self) -> Option<f32> {
        if self.replay.len() < self.batch_size {
            return None;
        }
        let batch = self.replay.sample(self.batch_size);
        let mut targets = Vec::with_capacity(batch.len());
        for experience in &batch {
            let next_q = self.target.predict(&experience.next_state);
            let max_next = next_q.iter().cloned().fold(f32::MIN, f32::max);
            let discount = if experience.done { 0.0 } else { self.gamma * max_next };
            targets.push(experience.reward + discount);
        }
        let loss = self.online.fit(&batch, &targets);
        self.epsilon.decay();
        self.updates_since_sync += 1;
        if self.updates_since_sync >= self.target_update_interval {
            self.online.copy_to(self.target.as_mut());
            self.updates_since_sync = 0;
        }
        Some(loss)
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon.epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::network::LinearQNetwork;

    fn sample_experience(action: usize, reward: f32) -> Experience {
        Experience {
            state: vec![0.1; crate::domain::STATE_DIM],
            action,
            reward,
            next_state: vec![0.2; crate::domain::STATE_DIM],
            done: false,
        }
    }

    #[test]
    fn select_action_respects_availability_mask() {
        let agent = DqnAgent::new(
            Box::new(LinearQNetwork::new(3)),
            100,
            EpsilonSchedule::new(0.0, 0.0, 1.0), // epsilon 0: always greedy
            8,
            0.9,
            10,
            "hash".to_string(),
        );
        let state = vec![0.5; crate::domain::STATE_DIM];
        let available = vec![false, true, false];
        let action = agent.select_action(&state, &available);
        assert_eq!(action, 1);
    }

    #[test]
    fn learn_returns_none_below_batch_size() {
        let mut agent = DqnAgent::new(
            Box::new(LinearQNetwork::new(3)),
            100,
            EpsilonSchedule::new(1.0, 0.05, 0.99),
            32,
            0.9,
            10,
            "hash".to_string(),
        );
        agent.push_experience(sample_experience(0, 1.0));
        assert!(agent.learn().is_none());
    }

    #[test]
    fn learn_updates_and_syncs_target_on_schedule() {
        let mut agent = DqnAgent::new(
            Box::new(LinearQNetwork::new(3)),
            100,
            EpsilonSchedule::new(1.0, 0.05, 0.99),
            4,
            0.9,
            2,
            "hash".to_string(),
        );
        for i in 0..4 {
            agent.push_experience(sample_experience(i % 3, 1.0));
        }
        assert!(agent.learn().is_some());
        assert!(agent.learn().is_some());
        // after 2 updates with target_update_interval=2, a sync occurred.
        assert_eq!(agent.updates_since_sync, 0);
    }

    #[test]
    fn stale_detection_compares_action_space_hash() {
        let agent = DqnAgent::new(
            Box::new(LinearQNetwork::new(3)),
            100,
            EpsilonSchedule::new(1.0, 0.05, 0.99),
            32,
            0.9,
            10,
            "hash-a".to_string(),
        );
        assert!(!agent.is_stale_for("hash-a"));
        assert!(agent.is_stale_for("hash-b"));
    }
}
