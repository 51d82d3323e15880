//! Bounded worker pool backing the Quantum Executor's cooperative fan-out
//! (spec §4.E: "CPU-bound bodies are offloaded to a bounded worker pool,
//! default = number of cores"). Grounded on the teacher's
//! `Supervisor::concurrency_limit: Arc<Semaphore>`
//! (`orchestrator/supervisor.rs`) rather than a dedicated OS thread pool —
//! variations are still plain async tasks, the semaphore just bounds how
//! many run concurrently.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity.max(1))),
        }
    }

    pub fn default_sized() -> Self {
        Self::new(std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4))
    }

    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore is never closed")
    }
}
