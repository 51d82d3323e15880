//! Collapse strategies (spec §4.E) — reduce a set of per-variation
//! `QuantumResult<T>` into one outcome.

use std::time::Duration;

use crate::domain::{CollapseStrategy, QuantumResult};

/// The collapsed outcome of a quantum task, covering every strategy's
/// return shape (spec §4.E: `COMBINED` returns a composite; the others
/// return a single winner).
#[derive(Debug, Clone)]
pub enum CollapseOutcome<T> {
    Single {
        winner: QuantumResult<T>,
        total_time: Duration,
    },
    Combined {
        primary: QuantumResult<T>,
        alternatives: Vec<QuantumResult<T>>,
        total_time: Duration,
    },
    AllFailed {
        errors: Vec<(String, String)>,
        total_time: Duration,
    },
}

impl<T> CollapseOutcome<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            CollapseOutcome::Single { winner, .. } => winner.value.as_ref(),
            CollapseOutcome::Combined { primary, .. } => primary.value.as_ref(),
            CollapseOutcome::AllFailed { .. } => None,
        }
    }
}

fn median(durations: &[Duration]) -> Duration {
    let mut sorted = durations.to_vec();
    sorted.sort();
    sorted[sorted.len() / 2]
}

fn all_failed<T>(results: Vec<QuantumResult<T>>, total_time: Duration) -> CollapseOutcome<T> {
    let errors = results
        .into_iter()
        .map(|r| (r.variation_id, r.error.unwrap_or_else(|| "unknown error".to_string())))
        .collect();
    CollapseOutcome::AllFailed { errors, total_time }
}

/// Dispatch on `CollapseStrategy` (spec §4.E). `scoring_fn` is required for
/// `BEST_SCORE` and unused by the others; its absence there is a caller
/// error, not a result-level failure, so we treat missing-when-required as
/// "no score, least preferred" rather than panicking.
pub fn collapse<T>(
    results: Vec<QuantumResult<T>>,
    strategy: CollapseStrategy,
    scoring_fn: Option<&(dyn Fn(&T) -> f32 + Send + Sync)>,
    total_time: Duration,
) -> CollapseOutcome<T>
where
    T: Clone + PartialEq,
{
    match strategy {
        CollapseStrategy::FirstSuccess => first_success(results, total_time),
        CollapseStrategy::BestScore => best_score(results, scoring_fn, total_time),
        CollapseStrategy::Consensus => consensus(results, total_time),
        CollapseStrategy::Combined => combined(results, scoring_fn, total_time),
        CollapseStrategy::Weighted => best_score(results, scoring_fn, total_time),
    }
}

/// Arrival order on the completion channel is already encoded by the
/// caller: the executor stops draining as soon as one success is seen, so
/// the first success in `results` (if any) is the winner.
fn first_success<T>(results: Vec<QuantumResult<T>>, total_time: Duration) -> CollapseOutcome<T>
where
    T: Clone,
{
    match results.into_iter().find(|r| r.success) {
        Some(winner) => CollapseOutcome::Single { winner, total_time },
        None => all_failed(Vec::new(), total_time),
    }
}

fn best_score<T>(
    results: Vec<QuantumResult<T>>,
    scoring_fn: Option<&(dyn Fn(&T) -> f32 + Send + Sync)>,
    total_time: Duration,
) -> CollapseOutcome<T>
where
    T: Clone,
{
    let successes: Vec<QuantumResult<T>> = results.into_iter().filter(|r| r.success).collect();
    if successes.is_empty() {
        return all_failed(Vec::new(), total_time);
    }
    let Some(score_of) = scoring_fn else {
        // No scoring function: fastest success wins, matching the
        // execution-time tie-break rule used when scores are equal.
        let winner = successes
            .into_iter()
            .min_by_key(|r| r.execution_time)
            .expect("non-empty");
        return CollapseOutcome::Single { winner, total_time };
    };
    let winner = successes
        .into_iter()
        .max_by(|a, b| {
            let sa = score_of(a.value.as_ref().expect("success carries a value"));
            let sb = score_of(b.value.as_ref().expect("success carries a value"));
            sa.partial_cmp(&sb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.execution_time.cmp(&a.execution_time))
        })
        .expect("non-empty");
    CollapseOutcome::Single { winner, total_time }
}

/// Groups successes by structural equality of `value` and returns the
/// largest group's representative, tie-broken by lowest median
/// execution time across the group (spec §4.E).
fn consensus<T>(results: Vec<QuantumResult<T>>, total_time: Duration) -> CollapseOutcome<T>
where
    T: Clone + PartialEq,
{
    let successes: Vec<QuantumResult<T>> = results.into_iter().filter(|r| r.success).collect();
    if successes.is_empty() {
        return all_failed(Vec::new(), total_time);
    }

    let mut groups: Vec<Vec<QuantumResult<T>>> = Vec::new();
    for result in successes {
        let value = result.value.as_ref().expect("success carries a value").clone();
        match groups.iter_mut().find(|g| g[0].value.as_ref() == Some(&value)) {
            Some(group) => group.push(result),
            None => groups.push(vec![result]),
        }
    }

    let winner_group = groups
        .into_iter()
        .max_by(|a, b| {
            a.len().cmp(&b.len()).then_with(|| {
                let times_a: Vec<Duration> = a.iter().map(|r| r.execution_time).collect();
                let times_b: Vec<Duration> = b.iter().map(|r| r.execution_time).collect();
                median(&times_b).cmp(&median(&times_a))
            })
        })
        .expect("non-empty");

    let winner = winner_group
        .into_iter()
        .min_by_key(|r| r.execution_time)
        .expect("non-empty group");
    CollapseOutcome::Single { winner, total_time }
}

fn combined<T>(
    results: Vec<QuantumResult<T>>,
    scoring_fn: Option<&(dyn Fn(&T) -> f32 + Send + Sync)>,
    total_time: Duration,
) -> CollapseOutcome<T>
where
    T: Clone,
{
    let mut successes: Vec<QuantumResult<T>> = results.into_iter().filter(|r| r.success).collect();
    if successes.is_empty() {
        return all_failed(Vec::new(), total_time);
    }

    let primary_index = if let Some(score_of) = scoring_fn {
        successes
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                let sa = score_of(a.value.as_ref().expect("success carries a value"));
                let sb = score_of(b.value.as_ref().expect("success carries a value"));
                sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    } else {
        0
    };

    let primary = successes.remove(primary_index);
    CollapseOutcome::Combined { primary, alternatives: successes, total_time }
}
