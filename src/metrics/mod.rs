//! Metrics Collector (spec §4.H) — in-memory, append-only ring buffers per
//! metric type, plus dashboard aggregation and cooldown-gated alert rules.
//! Grounded on the teacher's `EventBus` (`orchestrator/event_bus.rs`) for
//! the append/broadcast shape, generalized from a pub/sub of domain events
//! into a bounded, queryable time series per metric type.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::domain::{MetricEvent, MetricType};

/// Default ring capacity per metric type (spec §4.H).
pub const DEFAULT_RING_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCondition {
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
}

impl AlertCondition {
    fn breached(self, value: f64, threshold: f64) -> bool {
        match self {
            AlertCondition::GreaterThan => value > threshold,
            AlertCondition::LessThan => value < threshold,
            AlertCondition::GreaterOrEqual => value >= threshold,
            AlertCondition::LessOrEqual => value <= threshold,
        }
    }
}

pub struct AlertRule {
    pub metric_type: MetricType,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub cooldown: chrono::Duration,
    last_fired: Option<DateTime<Utc>>,
}

impl AlertRule {
    pub fn new(metric_type: MetricType, condition: AlertCondition, threshold: f64, cooldown: chrono::Duration) -> Self {
        Self { metric_type, condition, threshold, cooldown, last_fired: None }
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub success_rate_by_strategy: HashMap<String, f64>,
    pub latency_p50_by_provider: HashMap<String, f64>,
    pub latency_p95_by_provider: HashMap<String, f64>,
    pub latency_p99_by_provider: HashMap<String, f64>,
    pub cache_hit_rate: f64,
    pub learning_loss_trend: Vec<f64>,
    pub agent_success_rate_leaderboard: Vec<(String, f64)>,
}

pub struct MetricsCollector {
    ring_capacity: usize,
    series: RwLock<HashMap<MetricType, VecDeque<MetricEvent>>>,
    alert_rules: RwLock<Vec<AlertRule>>,
}

impl MetricsCollector {
    pub fn new(ring_capacity: usize) -> Self {
        Self {
            ring_capacity,
            series: RwLock::new(HashMap::new()),
            alert_rules: RwLock::new(Vec::new()),
        }
    }

    pub fn add_alert_rule(&self, rule: AlertRule) {
        self.alert_rules.write().expect("alert rules lock poisoned").push(rule);
    }

    /// `record(type, labels, value)` (spec §4.H) — O(1) append; oldest
    /// entry is evicted once the per-type ring is at capacity.
    pub fn record(&self, metric_type: MetricType, labels: HashMap<String, String>, value: f64) {
        let event = MetricEvent { timestamp: Utc::now(), metric_type, labels, value };
        {
            let mut series = self.series.write().expect("metrics lock poisoned");
            let ring = series.entry(metric_type).or_insert_with(|| VecDeque::with_capacity(self.ring_capacity));
            if ring.len() >= self.ring_capacity {
                ring.pop_front();
            }
            ring.push_back(event);
        }
        self.evaluate_alerts(metric_type, value);
    }

    fn evaluate_alerts(&self, metric_type: MetricType, value: f64) {
        let mut rules = self.alert_rules.write().expect("alert rules lock poisoned");
        let now = Utc::now();
        for rule in rules.iter_mut().filter(|r| r.metric_type == metric_type) {
            if !rule.condition.breached(value, rule.threshold) {
                continue;
            }
            if let Some(last) = rule.last_fired {
                if now - last < rule.cooldown {
                    continue;
                }
            }
            rule.last_fired = Some(now);
            let mut labels = HashMap::new();
            labels.insert("breached_metric".to_string(), format!("{metric_type:?}"));
            let mut series = self.series.write().expect("metrics lock poisoned");
            let ring = series
                .entry(MetricType::AlertBreach)
                .or_insert_with(|| VecDeque::with_capacity(self.ring_capacity));
            if ring.len() >= self.ring_capacity {
                ring.pop_front();
            }
            ring.push_back(MetricEvent { timestamp: now, metric_type: MetricType::AlertBreach, labels, value });
        }
    }

    /// `snapshot(type, since?)` (spec §4.H) — copy-on-read.
    pub fn snapshot(&self, metric_type: MetricType, since: Option<DateTime<Utc>>) -> Vec<MetricEvent> {
        let series = self.series.read().expect("metrics lock poisoned");
        match series.get(&metric_type) {
            None => Vec::new(),
            Some(ring) => ring
                .iter()
                .filter(|e| since.map_or(true, |s| e.timestamp >= s))
                .cloned()
                .collect(),
        }
    }

    /// `dashboard()` (spec §4.H) aggregation.
    pub fn dashboard(&self) -> Dashboard {
        let series = self.series.read().expect("metrics lock poisoned");

        let success_rate_by_strategy = group_avg(series.get(&MetricType::RoutingDecision), "strategy");

        let latency_events: Vec<&MetricEvent> =
            series.get(&MetricType::RoutingLatencyMs).map(|r| r.iter().collect()).unwrap_or_default();
        let latency_p50_by_provider = group_percentile(&latency_events, "provider", 0.50);
        let latency_p95_by_provider = group_percentile(&latency_events, "provider", 0.95);
        let latency_p99_by_provider = group_percentile(&latency_events, "provider", 0.99);

        let hits = series.get(&MetricType::CacheHit).map(|r| r.len()).unwrap_or(0) as f64;
        let misses = series.get(&MetricType::CacheMiss).map(|r| r.len()).unwrap_or(0) as f64;
        let cache_hit_rate = if hits + misses > 0.0 { hits / (hits + misses) } else { 0.0 };

        let learning_loss_trend =
            series.get(&MetricType::DqnLoss).map(|r| r.iter().map(|e| e.value).collect()).unwrap_or_default();

        let mut agent_totals: HashMap<String, (f64, usize)> = HashMap::new();
        if let Some(ring) = series.get(&MetricType::AgentExecution) {
            for event in ring {
                if let Some(agent_id) = event.labels.get("agent_id") {
                    let entry = agent_totals.entry(agent_id.clone()).or_insert((0.0, 0));
                    entry.0 += event.value;
                    entry.1 += 1;
                }
            }
        }
        let mut agent_success_rate_leaderboard: Vec<(String, f64)> = agent_totals
            .into_iter()
            .map(|(id, (sum, count))| (id, sum / count as f64))
            .collect();
        agent_success_rate_leaderboard.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Dashboard {
            success_rate_by_strategy,
            latency_p50_by_provider,
            latency_p95_by_provider,
            latency_p99_by_provider,
            cache_hit_rate,
            learning_loss_trend,
            agent_success_rate_leaderboard,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

fn group_avg(ring: Option<&VecDeque<MetricEvent>>, label_key: &str) -> HashMap<String, f64> {
    let mut totals: HashMap<String, (f64, usize)> = HashMap::new();
    if let Some(ring) = ring {
        for event in ring {
            if let Some(key) = event.labels.get(label_key) {
                let entry = totals.entry(key.clone()).or_insert((0.0, 0));
                entry.0 += event.value;
                entry.1 += 1;
            }
        }
    }
    totals.into_iter().map(|(k, (sum, count))| (k, sum / count as f64)).collect()
}

fn group_percentile(events: &[&MetricEvent], label_key: &str, percentile: f64) -> HashMap<String, f64> {
    let mut grouped: HashMap<String, Vec<f64>> = HashMap::new();
    for event in events {
        if let Some(key) = event.labels.get(label_key) {
            grouped.entry(key.clone()).or_default().push(event.value);
        }
    }
    grouped
        .into_iter()
        .map(|(k, mut values)| {
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let index = ((values.len() as f64 - 1.0) * percentile).round().max(0.0) as usize;
            (k, values[index.min(values.len() - 1)])
        })
        .collect()
}
