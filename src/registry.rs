//! Model Registry (spec §4.A) — a static, versioned catalog of provider/model
//! capabilities loaded once at startup. Read-only after construction; no
//! hot-reload.

use std::collections::HashMap;

use schemars::schema_for;

use crate::domain::ModelCapability;
use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    pub provider: Option<String>,
    pub min_reliability: Option<f32>,
    pub specialization: Option<String>,
}

/// Read-only catalog of `ModelCapability` records, keyed by `(provider,
/// model_id)`. The `action_space()` ordering is fixed for the lifetime of
/// the registry instance — it must stay stable for a trained DQN policy.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: HashMap<(String, String), ModelCapability>,
    /// Provider asc, then model_id asc — matches `list_models`'s
    /// deterministic order and doubles as the DQN action space.
    ordered_keys: Vec<(String, String)>,
}

impl ModelRegistry {
    /// Parse and validate a manifest (an array of `ModelCapability` JSON
    /// records). A schema violation or an out-of-range score/cost is a
    /// `ConfigurationError` and is meant to abort startup (spec §6, §7).
    pub fn from_manifest_json(raw: &str) -> Result<Self> {
        let models: Vec<ModelCapability> = serde_json::from_str(raw)
            .map_err(|e| OrchestratorError::Configuration(format!("manifest parse error: {e}")))?;
        Self::from_models(models)
    }

    pub fn from_models(models: Vec<ModelCapability>) -> Result<Self> {
        if models.is_empty() {
            return Err(OrchestratorError::Configuration(
                "model manifest contains no models".to_string(),
            ));
        }
        let mut map = HashMap::with_capacity(models.len());
        for m in models {
            m.validate()
                .map_err(|e| OrchestratorError::Configuration(format!("invalid model {}/{}: {e}", m.provider, m.model_id)))?;
            let key = m.key();
            if map.insert(key.clone(), m).is_some() {
                return Err(OrchestratorError::Configuration(format!(
                    "duplicate model entry for {}/{}",
                    key.0, key.1
                )));
            }
        }
        let mut ordered_keys: Vec<_> = map.keys().cloned().collect();
        ordered_keys.sort();
        Ok(Self {
            models: map,
            ordered_keys,
        })
    }

    /// JSON Schema for the manifest format, exposed so operators can
    /// validate a manifest file before shipping it (spec §6).
    pub fn manifest_schema() -> schemars::schema::RootSchema {
        schema_for!(Vec<ModelCapability>)
    }

    pub fn get(&self, provider: &str, model_id: &str) -> Option<&ModelCapability> {
        self.models.get(&(provider.to_string(), model_id.to_string()))
    }

    pub fn list_models(&self, filter: Option<&ModelFilter>) -> Vec<&ModelCapability> {
        let mut out: Vec<&ModelCapability> = self
            .ordered_keys
            .iter()
            .map(|k| &self.models[k])
            .filter(|m| match filter {
                None => true,
                Some(f) => {
                    f.provider.as_deref().map_or(true, |p| p == m.provider)
                        && f.min_reliability.map_or(true, |r| m.reliability >= r)
                        && f.specialization
                            .as_deref()
                            .map_or(true, |s| m.specializations.contains(s))
                }
            })
            .collect();
        out.sort_by(|a, b| (a.provider.as_str(), a.model_id.as_str()).cmp(&(b.provider.as_str(), b.model_id.as_str())));
        out
    }

    /// The ordered `(provider, model_id)` index the DQN agent chooses among.
    /// Stable for the lifetime of this registry instance.
    pub fn action_space(&self) -> &[(String, String)] {
        &self.ordered_keys
    }

    pub fn action_for(&self, provider: &str, model_id: &str) -> Option<usize> {
        self.ordered_keys
            .iter()
            .position(|(p, m)| p == provider && m == model_id)
    }

    pub fn decode_action(&self, action: usize) -> Option<&(String, String)> {
        self.ordered_keys.get(action)
    }

    pub fn len(&self) -> usize {
        self.ordered_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered_keys.is_empty()
    }

    /// Stable hash of the action space, used to invalidate a persisted DQN
    /// policy whose manifest has since changed (spec §6, §9).
    pub fn action_space_hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        for (provider, model_id) in &self.ordered_keys {
            hasher.update(provider.as_bytes());
            hasher.update([0u8]);
            hasher.update(model_id.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// Distinct providers in registry order, truncated to the first `n` —
    /// used by the DQN state vector's provider-availability slots (dims
    /// 11-15, spec §4.F).
    pub fn providers_in_order(&self, n: usize) -> Vec<String> {
        let mut seen = Vec::new();
        for (p, _) in &self.ordered_keys {
            if !seen.contains(p) {
                seen.push(p.clone());
            }
            if seen.len() == n {
                break;
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> Vec<ModelCapability> {
        vec![
            ModelCapability {
                provider: "anthropic".into(),
                model_id: "claude-fast".into(),
                code_gen_score: 0.7,
                reasoning_score: 0.6,
                context_window: 100_000,
                latency_hint_ms: 400,
                cost_per_token_in: 0.000_003,
                cost_per_token_out: 0.000_015,
                reliability: 0.98,
                specializations: Default::default(),
            },
            ModelCapability {
                provider: "openai".into(),
                model_id: "gpt-reasoner".into(),
                code_gen_score: 0.9,
                reasoning_score: 0.95,
                context_window: 200_000,
                latency_hint_ms: 1200,
                cost_per_token_in: 0.000_01,
                cost_per_token_out: 0.00003,
                reliability: 0.95,
                specializations: ["architecture".to_string()].into_iter().collect(),
            },
        ]
    }

    #[test]
    fn list_models_is_deterministic_provider_then_model() {
        let registry = ModelRegistry::from_models(sample_manifest()).unwrap();
        let listed = registry.list_models(None);
        assert_eq!(listed[0].provider, "anthropic");
        assert_eq!(listed[1].provider, "openai");
    }

    #[test]
    fn action_space_round_trips() {
        let registry = ModelRegistry::from_models(sample_manifest()).unwrap();
        for (idx, (provider, model_id)) in registry.action_space().to_vec().into_iter().enumerate() {
            assert_eq!(registry.action_for(&provider, &model_id), Some(idx));
            assert_eq!(registry.decode_action(idx), Some(&(provider, model_id)));
        }
    }

    #[test]
    fn rejects_out_of_range_scores() {
        let mut bad = sample_manifest();
        bad[0].reliability = 1.5;
        assert!(ModelRegistry::from_models(bad).is_err());
    }

    #[test]
    fn action_space_hash_changes_when_manifest_changes() {
        let a = ModelRegistry::from_models(sample_manifest()).unwrap();
        let mut changed = sample_manifest();
        changed.push(ModelCapability {
            provider: "google".into(),
            model_id: "gemini-x".into(),
            code_gen_score: 0.8,
            reasoning_score: 0.8,
            context_window: 128_000,
            latency_hint_ms: 500,
            cost_per_token_in: 0.000_002,
            cost_per_token_out: 0.000_008,
            reliability: 0.9,
            specializations: Default::default(),
        });
        let b = ModelRegistry::from_models(changed).unwrap();
        assert_ne!(a.action_space_hash(), b.action_space_hash());
    }
}
