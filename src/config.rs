//! Process-wide configuration, loaded once at startup.
//!
//! Mirrors the teacher repo's `dotenv`-then-`std::env::var` pattern
//! (`agent/provider.rs`): call [`Config::from_env`] once, early, and pass the
//! resulting value through construction rather than re-reading the
//! environment from deep inside a component.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub model_manifest_path: PathBuf,
    pub provider_timeout: Duration,
    pub quantum_variation_timeout: Duration,
    pub quantum_global_timeout: Duration,
    pub worker_pool_size: usize,

    pub epsilon_start: f32,
    pub epsilon_min: f32,
    pub epsilon_decay: f32,
    pub replay_buffer_capacity: usize,
    pub dqn_batch_size: usize,
    pub dqn_gamma: f32,
    pub dqn_target_update_interval: u32,

    pub routing_cache_capacity: usize,
    pub routing_cache_ttl: Duration,

    pub bus_queue_capacity: usize,
    pub metrics_ring_capacity: usize,

    /// Whether `orchestrate()` fans a request out through the Quantum
    /// Routing Manager's parallel strategies (spec §2: "If quantum routing
    /// is enabled..."). When `false`, `orchestrate()` routes with a single
    /// synchronous `AdvancedRouter` call, matching the manager's own
    /// fallback path.
    pub quantum_routing_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_manifest_path: PathBuf::from("resources/models.json"),
            provider_timeout: Duration::from_secs(30),
            quantum_variation_timeout: Duration::from_secs(20),
            quantum_global_timeout: Duration::from_secs(60),
            worker_pool_size: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),

            epsilon_start: 1.0,
            epsilon_min: 0.05,
            epsilon_decay: 0.995,
            replay_buffer_capacity: 10_000,
            dqn_batch_size: 32,
            dqn_gamma: 0.99,
            dqn_target_update_interval: 100,

            routing_cache_capacity: 10_000,
            routing_cache_ttl: Duration::from_secs(300),

            bus_queue_capacity: 1024,
            metrics_ring_capacity: 10_000,

            quantum_routing_enabled: true,
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults for
    /// anything unset. Reads a `.env` file if present (teacher convention).
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("ORCHESTRATOR_MODEL_MANIFEST") {
            cfg.model_manifest_path = PathBuf::from(v);
        }
        if let Some(v) = env_f64("ORCHESTRATOR_PROVIDER_TIMEOUT_SECS") {
            cfg.provider_timeout = Duration::from_secs_f64(v);
        }
        if let Some(v) = env_f64("ORCHESTRATOR_VARIATION_TIMEOUT_SECS") {
            cfg.quantum_variation_timeout = Duration::from_secs_f64(v);
        }
        if let Some(v) = env_f64("ORCHESTRATOR_GLOBAL_TIMEOUT_SECS") {
            cfg.quantum_global_timeout = Duration::from_secs_f64(v);
        }
        if let Some(v) = env_usize("ORCHESTRATOR_WORKER_POOL_SIZE") {
            cfg.worker_pool_size = v;
        }
        if let Some(v) = env_f32("EPSILON_START") {
            cfg.epsilon_start = v;
        }
        if let Some(v) = env_f32("EPSILON_MIN") {
            cfg.epsilon_min = v;
        }
        if let Some(v) = env_f32("EPSILON_DECAY") {
            cfg.epsilon_decay = v;
        }
        if let Some(v) = env_usize("REPLAY_BUFFER_CAPACITY") {
            cfg.replay_buffer_capacity = v;
        }
        if let Some(v) = env_usize("DQN_BATCH_SIZE") {
            cfg.dqn_batch_size = v;
        }
        if let Some(v) = env_usize("ROUTING_CACHE_CAPACITY") {
            cfg.routing_cache_capacity = v;
        }
        if let Some(v) = env_f64("ROUTING_CACHE_TTL_SECS") {
            cfg.routing_cache_ttl = Duration::from_secs_f64(v);
        }
        if let Some(v) = env_usize("BUS_QUEUE_CAPACITY") {
            cfg.bus_queue_capacity = v;
        }
        if let Some(v) = env_usize("METRICS_RING_CAPACITY") {
            cfg.metrics_ring_capacity = v;
        }
        if let Ok(v) = std::env::var("ORCHESTRATOR_QUANTUM_ROUTING_ENABLED") {
            cfg.quantum_routing_enabled = v != "0" && !v.eq_ignore_ascii_case("false");
        }

        cfg
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_f32(key: &str) -> Option<f32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_bounds() {
        let cfg = Config::default();
        assert!(cfg.epsilon_min <= cfg.epsilon_start);
        assert!(cfg.worker_pool_size >= 1);
        assert!(cfg.replay_buffer_capacity > 0);
    }
}
