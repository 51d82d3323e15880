//! Agent Registry (spec §4.J) — a capability-indexed directory of
//! registered agents, scored by health/success-rate EMA for
//! specialist-selection on multi-agent requests. Grounded on the teacher's
//! `ToolRegistry` (`tools/mod.rs`: a `RwLock`-guarded map with a
//! deterministic listing order) generalized from tools to agents.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use crate::domain::{AgentCapabilityType, AgentMetadata, AgentStatus};

/// Weighted scoring coefficients behind `find_best_for_task` (spec §4.J).
/// Fixed at compile time per the invariant that the weight sum is stable.
const W_PROFICIENCY: f32 = 0.5;
const W_HEALTH: f32 = 0.25;
const W_SUCCESS_RATE: f32 = 0.2;
const W_RESPONSE_TIME: f32 = 0.05;
/// Response times beyond this are treated as maximally penalized.
const RESPONSE_TIME_CEILING_MS: f64 = 30_000.0;

#[derive(Debug, Clone, Default)]
pub struct TaskProfile<'a> {
    pub required_capabilities: &'a [AgentCapabilityType],
    pub languages: &'a [String],
    pub min_proficiency: f32,
}

#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub status: Option<AgentStatus>,
    pub capability: Option<AgentCapabilityType>,
    pub tags: Vec<String>,
}

pub struct AgentRegistry {
    agents: RwLock<HashMap<String, AgentMetadata>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self { agents: RwLock::new(HashMap::new()) }
    }

    /// Adds or updates an agent, returning its `agent_id`.
    pub fn register(&self, metadata: AgentMetadata) -> String {
        let id = metadata.agent_id.clone();
        self.agents.write().expect("registry lock poisoned").insert(id.clone(), metadata);
        id
    }

    pub fn unregister(&self, agent_id: &str) -> bool {
        self.agents.write().expect("registry lock poisoned").remove(agent_id).is_some()
    }

    pub fn get(&self, agent_id: &str) -> Option<AgentMetadata> {
        self.agents.read().expect("registry lock poisoned").get(agent_id).cloned()
    }

    /// Ordered by `health_score` desc, then `success_rate` desc (spec §4.J).
    pub fn list(&self, filter: &AgentFilter) -> Vec<AgentMetadata> {
        let agents = self.agents.read().expect("registry lock poisoned");
        let mut matching: Vec<AgentMetadata> = agents
            .values()
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .filter(|a| {
                filter
                    .capability
                    .map_or(true, |c| a.capabilities.iter().any(|cap| cap.capability_type == c))
            })
            .filter(|a| filter.tags.iter().all(|t| a.tags.contains(t)))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.health_score
                .partial_cmp(&a.health_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.success_rate.partial_cmp(&a.success_rate).unwrap_or(std::cmp::Ordering::Equal))
        });
        matching
    }

    /// `find_best_for_task` (spec §4.J). Candidates must carry every
    /// required capability type at or above `min_proficiency`, and every
    /// required language across their combined capability set.
    pub fn find_best_for_task(&self, profile: &TaskProfile<'_>) -> Option<String> {
        let agents = self.agents.read().expect("registry lock poisoned");
        let mut candidates: Vec<&AgentMetadata> = agents
            .values()
            .filter(|a| a.status == AgentStatus::Active)
            .filter(|a| {
                profile.required_capabilities.iter().all(|required| {
                    a.capabilities
                        .iter()
                        .any(|cap| cap.capability_type == *required && cap.proficiency_level >= profile.min_proficiency)
                })
            })
            .filter(|a| {
                profile.languages.iter().all(|lang| {
                    a.capabilities.iter().any(|cap| cap.supported_languages.iter().any(|l| l == lang))
                })
            })
            .collect();

        if candidates.is_empty() {
            return None;
        }

        candidates.sort_by(|a, b| {
            let score_a = agent_score(a, profile.required_capabilities);
            let score_b = agent_score(b, profile.required_capabilities);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.execution_count.cmp(&b.execution_count))
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        });

        Some(candidates[0].agent_id.clone())
    }

    /// `record_execution` (spec §4.J) — EMA update with weight 0.1 on the
    /// new sample, matching the teacher's moving-average idiom used
    /// elsewhere in the agency for rolling metrics.
    pub fn record_execution(&self, agent_id: &str, success: bool, duration: Duration) {
        const EMA_WEIGHT: f32 = 0.1;
        let mut agents = self.agents.write().expect("registry lock poisoned");
        if let Some(agent) = agents.get_mut(agent_id) {
            agent.execution_count += 1;
            let sample = if success { 1.0 } else { 0.0 };
            agent.success_rate = agent.success_rate * (1.0 - EMA_WEIGHT) + sample * EMA_WEIGHT;
            let sample_ms = duration.as_millis() as f32;
            let prev_ms = agent.avg_response_time.as_millis() as f32;
            let new_ms = prev_ms * (1.0 - EMA_WEIGHT) + sample_ms * EMA_WEIGHT;
            agent.avg_response_time = Duration::from_millis(new_ms.max(0.0) as u64);

            if success {
                agent.consecutive_failures = 0;
                if agent.status == AgentStatus::Degraded || agent.status == AgentStatus::Failed {
                    agent.status = AgentStatus::Active;
                }
            } else {
                agent.consecutive_failures += 1;
                agent.status = match agent.consecutive_failures {
                    0..=2 => agent.status,
                    3..=4 => AgentStatus::Degraded,
                    _ => AgentStatus::Failed,
                };
            }
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn agent_score(agent: &AgentMetadata, required: &[AgentCapabilityType]) -> f32 {
    let proficiency = if required.is_empty() {
        1.0
    } else {
        let sum: f32 = required
            .iter()
            .filter_map(|rc| agent.capabilities.iter().find(|c| c.capability_type == *rc))
            .map(|c| c.proficiency_level)
            .sum();
        sum / required.len() as f32
    };
    let normalized_response_time =
        (agent.avg_response_time.as_millis() as f64 / RESPONSE_TIME_CEILING_MS).min(1.0) as f32;

    W_PROFICIENCY * proficiency + W_HEALTH * agent.health_score + W_SUCCESS_RATE * agent.success_rate
        - W_RESPONSE_TIME * normalized_response_time
}
