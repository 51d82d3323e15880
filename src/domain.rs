//! The request/response data model shared across every component (spec §3).
//!
//! Types here are plain data: no component-specific behavior lives in this
//! module beyond small, total helper methods (ordering, bucketing). Request
//! is immutable once constructed — nothing in the crate mutates a `Request`
//! in place.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The closed task-type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CodeGeneration,
    CodeAnalysis,
    Testing,
    Documentation,
    Review,
    Debugging,
    Refactoring,
    Architecture,
    Custom,
}

/// Optional persona overrides carried on a [`Request`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub persona: Option<PersonaId>,
}

/// Optional routing preferences carried on a [`Request`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// Bias the Advanced Router's weighting towards low cost.
    pub cost_efficient: bool,
    /// Bias the Advanced Router's weighting towards capability/performance.
    pub performance_focused: bool,
    /// `allow_downgrade`: select a below-complexity-floor model rather than
    /// fail with `NoEligibleModel` when nothing clears the floor.
    pub allow_downgrade: bool,
}

/// Immutable inbound request. Constructed once at entry and never mutated;
/// downstream components derive new values (e.g. `effective_prompt`) rather
/// than writing back into the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub prompt: String,
    pub task_type: TaskType,
    #[serde(default)]
    pub files: Vec<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub persona_config: PersonaConfig,
    pub provider_preference: Option<String>,
}

impl Request {
    pub fn new(prompt: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            prompt: prompt.into(),
            task_type,
            files: Vec::new(),
            language: None,
            preferences: Preferences::default(),
            persona_config: PersonaConfig::default(),
            provider_preference: None,
        }
    }
}

/// Ordered complexity bands. Numeric band defines the expected capability
/// floor a candidate model must clear for `>= Complex` requests (spec §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Trivial,
    Simple,
    Moderate,
    Complex,
    VeryComplex,
    Expert,
    Critical,
}

impl ComplexityLevel {
    /// The minimum `capability_fit` (on the registry's `code_gen_score` /
    /// `reasoning_score` scale, whichever is task-relevant) a model must
    /// clear to be eligible for this complexity band, used as the
    /// complexity-floor filter in Advanced Router step 3.
    pub fn capability_floor(self) -> f32 {
        match self {
            ComplexityLevel::Trivial => 0.0,
            ComplexityLevel::Simple => 0.2,
            ComplexityLevel::Moderate => 0.4,
            ComplexityLevel::Complex => 0.6,
            ComplexityLevel::VeryComplex => 0.75,
            ComplexityLevel::Expert => 0.85,
            ComplexityLevel::Critical => 0.92,
        }
    }

    pub fn requires_floor_check(self) -> bool {
        self >= ComplexityLevel::Complex
    }

    /// Bucket a normalized `[0,1]` complexity score into a level using fixed
    /// thresholds (spec §4.C step 1).
    pub fn from_score(score: f32) -> Self {
        match score {
            s if s < 0.15 => ComplexityLevel::Trivial,
            s if s < 0.30 => ComplexityLevel::Simple,
            s if s < 0.50 => ComplexityLevel::Moderate,
            s if s < 0.68 => ComplexityLevel::Complex,
            s if s < 0.82 => ComplexityLevel::VeryComplex,
            s if s < 0.93 => ComplexityLevel::Expert,
            _ => ComplexityLevel::Critical,
        }
    }
}

/// The closed context-type set (~10 categories, spec §3). Order here is the
/// one-hot slot order consumed by the DQN state vector (dims 1-10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    CodeGeneration,
    Debugging,
    Architecture,
    Security,
    Performance,
    Testing,
    Documentation,
    Review,
    Refactoring,
    General,
}

impl ContextType {
    pub const ALL: [ContextType; 10] = [
        ContextType::CodeGeneration,
        ContextType::Debugging,
        ContextType::Architecture,
        ContextType::Security,
        ContextType::Performance,
        ContextType::Testing,
        ContextType::Documentation,
        ContextType::Review,
        ContextType::Refactoring,
        ContextType::General,
    ];

    /// Index into the fixed slot order used for one-hot encoding.
    pub fn slot_index(self) -> usize {
        Self::ALL.iter().position(|c| *c == self).expect("closed enum")
    }

    /// Direct mapping from a non-custom `TaskType`.
    pub fn from_task_type(t: TaskType) -> Option<ContextType> {
        match t {
            TaskType::CodeGeneration => Some(ContextType::CodeGeneration),
            TaskType::CodeAnalysis => Some(ContextType::Review),
            TaskType::Testing => Some(ContextType::Testing),
            TaskType::Documentation => Some(ContextType::Documentation),
            TaskType::Review => Some(ContextType::Review),
            TaskType::Debugging => Some(ContextType::Debugging),
            TaskType::Refactoring => Some(ContextType::Refactoring),
            TaskType::Architecture => Some(ContextType::Architecture),
            TaskType::Custom => None,
        }
    }
}

/// Persona identity (spec §3). Immutable per process once the persona table
/// is built at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaId {
    Developer,
    Architect,
    Reviewer,
    SecurityAnalyst,
    PerformanceExpert,
    Tester,
    TechnicalWriter,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: PersonaId,
    pub prompt_preamble: String,
    pub preferred_context_types: BTreeSet<ContextTypeKey>,
    pub preferred_complexity: BTreeSet<ComplexityLevelKey>,
}

/// `ContextType`/`ComplexityLevel` don't implement `Ord` directly in a way
/// that's meaningful as a *set key* beyond their enum order, but `BTreeSet`
/// needs `Ord`; these newtypes exist purely so `Persona` can hold ordered
/// sets without pulling `Ord` onto the domain enums for unrelated reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextTypeKey(pub ContextType);

impl ContextType {
    pub fn key(self) -> ContextTypeKey {
        ContextTypeKey(self)
    }
}

impl PartialOrd for ContextType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.slot_index().cmp(&other.slot_index()))
    }
}
impl Ord for ContextType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.slot_index().cmp(&other.slot_index())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComplexityLevelKey(pub ComplexityLevel);

impl ComplexityLevel {
    pub fn key(self) -> ComplexityLevelKey {
        ComplexityLevelKey(self)
    }
}

/// Static capability/cost record for one `(provider, model_id)` pair,
/// loaded from the manifest at startup (spec §3, §4.A).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ModelCapability {
    pub provider: String,
    pub model_id: String,
    pub code_gen_score: f32,
    pub reasoning_score: f32,
    pub context_window: u32,
    pub latency_hint_ms: u32,
    pub cost_per_token_in: f64,
    pub cost_per_token_out: f64,
    pub reliability: f32,
    #[serde(default)]
    pub specializations: BTreeSet<String>,
}

impl ModelCapability {
    pub fn validate(&self) -> Result<(), String> {
        for (name, v) in [
            ("code_gen_score", self.code_gen_score),
            ("reasoning_score", self.reasoning_score),
            ("reliability", self.reliability),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(format!("{name} must be in [0,1], got {v}"));
            }
        }
        if self.cost_per_token_in < 0.0 || self.cost_per_token_out < 0.0 {
            return Err("cost must be >= 0".to_string());
        }
        if self.context_window < 1 {
            return Err("context_window must be >= 1".to_string());
        }
        Ok(())
    }

    pub fn key(&self) -> (String, String) {
        (self.provider.clone(), self.model_id.clone())
    }
}

/// Breakdown of the three scoring axes behind a [`RoutingDecision`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoringBreakdown {
    pub complexity: f32,
    pub context: f32,
    pub capability: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub provider: String,
    pub model_id: String,
    pub persona: PersonaId,
    pub confidence: f32,
    pub reasoning: String,
    pub scoring_breakdown: ScoringBreakdown,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RoutingDecision {
    pub fn key(&self) -> (String, String) {
        (self.provider.clone(), self.model_id.clone())
    }
}

/// One variation's outcome from the Quantum Executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantumResult<T> {
    pub value: Option<T>,
    pub success: bool,
    pub variation_id: String,
    pub execution_time: Duration,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl<T> QuantumResult<T> {
    pub fn ok(variation_id: impl Into<String>, value: T, execution_time: Duration) -> Self {
        Self {
            value: Some(value),
            success: true,
            variation_id: variation_id.into(),
            execution_time,
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn err(variation_id: impl Into<String>, error: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            value: None,
            success: false,
            variation_id: variation_id.into(),
            execution_time,
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollapseStrategy {
    FirstSuccess,
    BestScore,
    Consensus,
    Combined,
    Weighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingStrategy {
    LearningOptimized,
    TaskOptimized,
    PerformanceFocused,
    Balanced,
    CostEfficient,
}

impl RoutingStrategy {
    pub const ALL: [RoutingStrategy; 5] = [
        RoutingStrategy::LearningOptimized,
        RoutingStrategy::TaskOptimized,
        RoutingStrategy::PerformanceFocused,
        RoutingStrategy::Balanced,
        RoutingStrategy::CostEfficient,
    ];

    /// Strategy-specific prior used by the `WEIGHTED` collapse in the
    /// Quantum Routing Manager (resolved Open Question, see SPEC_FULL §4.G).
    pub fn default_prior_weight(self) -> f32 {
        match self {
            RoutingStrategy::LearningOptimized => 1.2,
            RoutingStrategy::TaskOptimized => 1.1,
            RoutingStrategy::PerformanceFocused => 1.0,
            RoutingStrategy::Balanced => 1.0,
            RoutingStrategy::CostEfficient => 0.85,
        }
    }
}

/// One training sample for the DQN agent (spec §3). `state`/`next_state` are
/// fixed-length 21-dim vectors (see `learning::state`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub state: Vec<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Vec<f32>,
    pub done: bool,
}

pub const STATE_DIM: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
    Degraded,
    Maintenance,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCapabilityType {
    CodeGeneration,
    CodeAnalysis,
    Testing,
    Documentation,
    Review,
    Debugging,
    Refactoring,
    Architecture,
    Research,
    CodeExecution,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapability {
    #[serde(rename = "type")]
    pub capability_type: AgentCapabilityType,
    pub proficiency_level: f32,
    #[serde(default)]
    pub supported_languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub agent_id: String,
    pub name: String,
    pub version: String,
    pub capabilities: Vec<AgentCapability>,
    pub status: AgentStatus,
    pub health_score: f32,
    pub success_rate: f32,
    pub avg_response_time: Duration,
    pub execution_count: u64,
    pub tags: BTreeSet<String>,
    pub endpoint: Option<String>,
    /// Consecutive health-check failures; drives the status state machine
    /// (3 -> degraded, 5 -> failed, spec §4 "State machines").
    #[serde(default)]
    pub consecutive_failures: u32,
}

impl AgentMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            agent_id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            version: version.into(),
            capabilities: Vec::new(),
            status: AgentStatus::Active,
            health_score: 1.0,
            success_rate: 1.0,
            avg_response_time: Duration::from_millis(0),
            execution_count: 0,
            tags: BTreeSet::new(),
            endpoint: None,
            consecutive_failures: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    TaskRequest,
    Collaboration,
    Status,
    Knowledge,
    Coordination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    // Declared low-to-high so the derived `Ord` sorts ascending by urgency;
    // callers needing a max-heap by priority compare in reverse.
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessageTarget {
    Agent(String),
    Broadcast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    pub from_agent: String,
    pub to: MessageTarget,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub priority: MessagePriority,
    pub correlation_id: Option<String>,
    pub payload: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl AgentMessage {
    pub fn new(
        from_agent: impl Into<String>,
        to: MessageTarget,
        message_type: MessageType,
        priority: MessagePriority,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            from_agent: from_agent.into(),
            to,
            message_type,
            priority,
            correlation_id: None,
            payload,
            timestamp: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    RoutingDecision,
    RoutingLatencyMs,
    QuantumLatencyMs,
    CollapseOutcome,
    CacheHit,
    CacheMiss,
    DqnLoss,
    AgentExecution,
    AlertBreach,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEvent {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub metric_type: MetricType,
    pub labels: HashMap<String, String>,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complexity_from_score_buckets_at_fixed_thresholds() {
        assert_eq!(ComplexityLevel::from_score(0.0), ComplexityLevel::Trivial);
        assert_eq!(ComplexityLevel::from_score(0.14), ComplexityLevel::Trivial);
        assert_eq!(ComplexityLevel::from_score(0.15), ComplexityLevel::Simple);
        assert_eq!(ComplexityLevel::from_score(0.30), ComplexityLevel::Moderate);
        assert_eq!(ComplexityLevel::from_score(0.50), ComplexityLevel::Complex);
        assert_eq!(ComplexityLevel::from_score(0.68), ComplexityLevel::VeryComplex);
        assert_eq!(ComplexityLevel::from_score(0.82), ComplexityLevel::Expert);
        assert_eq!(ComplexityLevel::from_score(0.93), ComplexityLevel::Critical);
        assert_eq!(ComplexityLevel::from_score(1.0), ComplexityLevel::Critical);
    }

    #[test]
    fn complexity_ordering_is_total_and_monotonic() {
        assert!(ComplexityLevel::Trivial < ComplexityLevel::Simple);
        assert!(ComplexityLevel::Complex < ComplexityLevel::Critical);
        assert!(ComplexityLevel::Complex.requires_floor_check());
        assert!(!ComplexityLevel::Moderate.requires_floor_check());
        assert!(ComplexityLevel::Critical.capability_floor() > ComplexityLevel::Trivial.capability_floor());
    }

    #[test]
    fn context_type_slot_index_matches_all_order() {
        for (i, c) in ContextType::ALL.iter().enumerate() {
            assert_eq!(c.slot_index(), i);
        }
    }

    #[test]
    fn context_type_from_task_type_maps_directly_except_custom() {
        assert_eq!(ContextType::from_task_type(TaskType::CodeGeneration), Some(ContextType::CodeGeneration));
        assert_eq!(ContextType::from_task_type(TaskType::Debugging), Some(ContextType::Debugging));
        assert_eq!(ContextType::from_task_type(TaskType::Custom), None);
    }

    fn sample_model() -> ModelCapability {
        ModelCapability {
            provider: "openai".into(),
            model_id: "gpt-x".into(),
            code_gen_score: 0.8,
            reasoning_score: 0.7,
            context_window: 8_000,
            latency_hint_ms: 100,
            cost_per_token_in: 0.000_001,
            cost_per_token_out: 0.000_002,
            reliability: 0.95,
            specializations: Default::default(),
        }
    }

    #[test]
    fn model_capability_validate_accepts_well_formed_record() {
        assert!(sample_model().validate().is_ok());
    }

    #[test]
    fn model_capability_validate_rejects_out_of_range_score() {
        let mut m = sample_model();
        m.reasoning_score = 1.5;
        assert!(m.validate().is_err());
    }

    #[test]
    fn model_capability_validate_rejects_negative_cost() {
        let mut m = sample_model();
        m.cost_per_token_out = -0.1;
        assert!(m.validate().is_err());
    }

    #[test]
    fn model_capability_validate_rejects_zero_context_window() {
        let mut m = sample_model();
        m.context_window = 0;
        assert!(m.validate().is_err());
    }

    #[test]
    fn quantum_result_ok_and_err_are_mutually_exclusive() {
        let ok = QuantumResult::ok("a", 42, Duration::from_millis(1));
        assert!(ok.success);
        assert!(ok.value.is_some());
        assert!(ok.error.is_none());

        let err = QuantumResult::<i32>::err("b", "boom", Duration::from_millis(1));
        assert!(!err.success);
        assert!(err.value.is_none());
        assert!(err.error.is_some());
    }

    #[test]
    fn routing_strategy_prior_weights_favor_learning_over_cost_efficient() {
        assert!(RoutingStrategy::LearningOptimized.default_prior_weight() > RoutingStrategy::CostEfficient.default_prior_weight());
        assert_eq!(RoutingStrategy::ALL.len(), 5);
    }

    #[test]
    fn agent_metadata_new_starts_active_with_zeroed_history() {
        let agent = AgentMetadata::new("scout", "0.1.0");
        assert_eq!(agent.status, AgentStatus::Active);
        assert_eq!(agent.execution_count, 0);
        assert_eq!(agent.consecutive_failures, 0);
        assert!((agent.health_score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn request_new_has_no_files_or_persona_override() {
        let req = Request::new("do a thing", TaskType::CodeGeneration);
        assert!(req.files.is_empty());
        assert!(req.persona_config.persona.is_none());
        assert!(req.provider_preference.is_none());
    }
}
