//! Complexity scoring (spec §4.C step 1) — combine prompt-length buckets,
//! keyword counts, code-complexity indicators, file-attachment count, and
//! multi-step markers into a normalized `[0,1]` score, then bucket into a
//! `ComplexityLevel` using fixed thresholds.

use lazy_static::lazy_static;
use regex::Regex;

use crate::domain::{ComplexityLevel, Request};

lazy_static! {
    static ref TECHNICAL_KEYWORDS: Vec<&'static str> = vec![
        "algorithm", "architecture", "concurrency", "distributed", "scalability",
        "optimization", "thread-safe", "race condition", "deadlock", "consistency",
        "idempotent", "throughput", "latency", "fault-tolerant", "microservice",
        "async", "kernel", "compiler", "protocol", "cryptograph",
    ];
    static ref CODE_INDICATOR_RE: Regex = Regex::new(r"[\{\}]|\bfn\b|\bfunction\b|\bdef\b|\bclass\b|\bimport\b|\buse\b").unwrap();
    static ref MULTI_STEP_RE: Regex = Regex::new(r"(?i)\bfirst\b.*\bthen\b.*\bfinally\b|\bfirst\b.*\bthen\b").unwrap();
}

/// Weights for each signal in the combined complexity score. Kept as
/// constants rather than struct fields — there is exactly one scoring
/// policy, not a family of them, so a config struct would be ceremony.
const W_LENGTH: f32 = 0.25;
const W_KEYWORDS: f32 = 0.25;
const W_CODE_INDICATORS: f32 = 0.2;
const W_FILES: f32 = 0.15;
const W_MULTI_STEP: f32 = 0.15;

/// Log-scale bucket of the prompt length, normalized to `[0,1]`.
fn length_score(prompt: &str) -> f32 {
    let len = prompt.len().max(1) as f32;
    // 1 char -> ~0, 4000+ chars saturates near 1.0.
    (len.ln() / 8.3_f32.ln()).clamp(0.0, 1.0)
}

fn keyword_score(prompt_lower: &str) -> f32 {
    let count = TECHNICAL_KEYWORDS.iter().filter(|k| prompt_lower.contains(**k)).count();
    (count as f32 / 4.0).clamp(0.0, 1.0)
}

fn code_indicator_score(prompt: &str) -> f32 {
    let count = CODE_INDICATOR_RE.find_iter(prompt).count();
    (count as f32 / 6.0).clamp(0.0, 1.0)
}

fn file_score(file_count: usize) -> f32 {
    (file_count as f32 / 5.0).clamp(0.0, 1.0)
}

fn multi_step_score(prompt: &str) -> f32 {
    if MULTI_STEP_RE.is_match(prompt) {
        1.0
    } else {
        0.0
    }
}

/// The normalized `[0,1]` complexity score for a request (before bucketing).
pub fn complexity_score(request: &Request) -> f32 {
    let prompt_lower = request.prompt.to_lowercase();
    let score = W_LENGTH * length_score(&request.prompt)
        + W_KEYWORDS * keyword_score(&prompt_lower)
        + W_CODE_INDICATORS * code_indicator_score(&request.prompt)
        + W_FILES * file_score(request.files.len())
        + W_MULTI_STEP * multi_step_score(&request.prompt);
    score.clamp(0.0, 1.0)
}

pub fn classify_complexity(request: &Request) -> (ComplexityLevel, f32) {
    let score = complexity_score(request);
    (ComplexityLevel::from_score(score), score)
}
