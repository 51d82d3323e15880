//! Quantum Executor (spec §4.E) — runs N task variations as cooperative
//! tasks on the tokio runtime and collapses their outcomes to one result by
//! strategy. Grounded on the teacher's `Supervisor::concurrency_limit`
//! (`orchestrator/supervisor.rs`), which bounds fan-out with an
//! `Arc<Semaphore>` rather than a dedicated thread pool.

mod collapse;
mod worker_pool;

pub use collapse::{collapse, CollapseOutcome};
pub use worker_pool::WorkerPool;

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::mpsc;

use crate::domain::{CollapseStrategy, QuantumResult};
use crate::error::{OrchestratorError, Result};
use crate::provider::CancellationToken;

type VariationFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// One task variation: an id for correlation, a parameter bag carried
/// through to the result's metadata, and a cancellation-aware body.
pub struct TaskVariation<T> {
    pub id: String,
    pub params: serde_json::Map<String, serde_json::Value>,
    body: Box<dyn FnOnce(CancellationToken) -> VariationFuture<T> + Send>,
}

impl<T> TaskVariation<T> {
    pub fn new<F, Fut>(id: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            id: id.into(),
            params: serde_json::Map::new(),
            body: Box::new(move |token| Box::pin(body(token))),
        }
    }

    pub fn with_params(mut self, params: serde_json::Map<String, serde_json::Value>) -> Self {
        self.params = params;
        self
    }
}

/// `execute_quantum_task(variations, strategy, scoring_fn?, timeout?)` (spec
/// §4.E). `scoring_fn` is required by `BEST_SCORE` and ignored otherwise.
/// The per-variation timeout is carried by each variation's own body; the
/// `global_timeout` here bounds the whole fan-out.
pub async fn execute_quantum_task<T>(
    variations: Vec<TaskVariation<T>>,
    strategy: CollapseStrategy,
    scoring_fn: Option<Box<dyn Fn(&T) -> f32 + Send + Sync>>,
    global_timeout: Option<Duration>,
    pool: &WorkerPool,
) -> CollapseOutcome<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    let started = Instant::now();
    let variation_count = variations.len();
    let (tx, mut rx) = mpsc::unbounded_channel::<QuantumResult<T>>();
    let group_token = CancellationToken::new();

    let mut handles = Vec::with_capacity(variation_count);
    for variation in variations {
        let tx = tx.clone();
        let token = group_token.clone();
        let permit_pool = pool.clone();
        let id = variation.id.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit_pool.acquire().await;
            let start = Instant::now();
            let fut = (variation.body)(token.clone());
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Err(OrchestratorError::Cancelled(id.clone())),
                r = fut => r,
            };
            let elapsed = start.elapsed();
            let result = match outcome {
                Ok(value) => QuantumResult::ok(id, value, elapsed),
                Err(e) => QuantumResult::err(id, e.to_string(), elapsed),
            };
            let _ = tx.send(result);
        });
        handles.push(handle);
    }
    drop(tx);

    let mut collected = Vec::with_capacity(variation_count);

    if strategy == CollapseStrategy::FirstSuccess {
        while let Some(result) = rx.recv().await {
            let is_success = result.success;
            collected.push(result);
            if is_success {
                group_token.cancel();
                break;
            }
            if collected.len() == variation_count {
                break;
            }
        }
        // Drain remaining arrivals without blocking further so spawned
        // tasks can observe cancellation and exit; we don't wait on them.
        drop(handles);
    } else if let Some(timeout) = global_timeout {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                biased;
                maybe = rx.recv() => {
                    match maybe {
                        Some(result) => collected.push(result),
                        None => break,
                    }
                    if collected.len() == variation_count {
                        break;
                    }
                }
                _ = &mut deadline => {
                    group_token.cancel();
                    break;
                }
            }
        }
        join_all(handles).await;
    } else {
        while let Some(result) = rx.recv().await {
            collected.push(result);
        }
        join_all(handles).await;
    }

    collapse(collected, strategy, scoring_fn.as_deref(), started.elapsed())
}
