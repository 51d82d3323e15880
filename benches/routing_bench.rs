//! Throughput/latency benchmarks for the two operations on the request
//! hot path that scale with configuration rather than with input size: the
//! Advanced Router's capability scoring pass, and the Quantum Executor's
//! fan-out/collapse. Grounded on the benchmark structure used elsewhere in
//! the example pack for async, parameterized criterion benchmarks
//! (`criterion_group!`/`criterion_main!`, `Runtime::new()` +
//! `b.to_async(&rt).iter(...)`, `BenchmarkId::new(...)`,
//! `group.throughput(...)`).

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

use orchestrator_core::cache::{fingerprint, RoutingCache};
use orchestrator_core::domain::{
    CollapseStrategy, ModelCapability, PersonaId, Request, RoutingDecision, ScoringBreakdown, TaskType,
};
use orchestrator_core::quantum::{execute_quantum_task, TaskVariation, WorkerPool};
use orchestrator_core::registry::ModelRegistry;
use orchestrator_core::router::AdvancedRouter;

fn sample_model(provider: &str, index: usize) -> ModelCapability {
    ModelCapability {
        provider: provider.to_string(),
        model_id: format!("model-{index}"),
        code_gen_score: 0.5 + (index % 5) as f32 * 0.1,
        reasoning_score: 0.4 + (index % 4) as f32 * 0.1,
        context_window: 32_000,
        latency_hint_ms: 200 + (index % 10) as u32 * 50,
        cost_per_token_in: 0.000_001,
        cost_per_token_out: 0.000_002,
        reliability: 0.9,
        specializations: Default::default(),
    }
}

fn registry_of_size(size: usize) -> ModelRegistry {
    let models = (0..size)
        .map(|i| sample_model(if i % 2 == 0 { "openai" } else { "anthropic" }, i))
        .collect();
    ModelRegistry::from_models(models).expect("valid sample registry")
}

fn bench_router_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("advanced_router_route");
    for &size in &[4usize, 16, 64, 256] {
        let registry = registry_of_size(size);
        let request = Request::new("write a rust function that parses a config file", TaskType::CodeGeneration);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("registry_size", size), &size, |b, _| {
            let router = AdvancedRouter::new(&registry);
            b.iter(|| black_box(router.route(black_box(&request)).unwrap()));
        });
    }
    group.finish();
}

fn bench_quantum_collapse(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let pool = WorkerPool::new(8);
    let mut group = c.benchmark_group("quantum_executor_collapse");
    group.measurement_time(Duration::from_secs(8));

    for &variations in &[2usize, 4, 8, 16] {
        group.throughput(Throughput::Elements(variations as u64));
        group.bench_with_input(
            BenchmarkId::new("first_success", variations),
            &variations,
            |b, &variations| {
                b.to_async(&rt).iter(|| {
                    let pool = pool.clone();
                    async move {
                        let tasks: Vec<TaskVariation<u32>> = (0..variations)
                            .map(|i| TaskVariation::new(format!("v{i}"), move |_token| async move { Ok(i as u32) }))
                            .collect();
                        black_box(execute_quantum_task(tasks, CollapseStrategy::FirstSuccess, None, None, &pool).await)
                    }
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("best_score", variations), &variations, |b, &variations| {
            b.to_async(&rt).iter(|| {
                let pool = pool.clone();
                async move {
                    let tasks: Vec<TaskVariation<u32>> = (0..variations)
                        .map(|i| TaskVariation::new(format!("v{i}"), move |_token| async move { Ok(i as u32) }))
                        .collect();
                    let scoring: Box<dyn Fn(&u32) -> f32 + Send + Sync> = Box::new(|v: &u32| *v as f32);
                    black_box(
                        execute_quantum_task(tasks, CollapseStrategy::BestScore, Some(scoring), None, &pool).await,
                    )
                }
            });
        });
    }
    group.finish();
}

fn bench_routing_cache(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("routing_cache");

    group.bench_function("fingerprint", |b| {
        b.iter(|| {
            black_box(fingerprint(
                black_box("write a rust function that parses a config file"),
                "code_generation",
                Some("rust"),
                "developer",
                None,
            ))
        });
    });

    group.bench_function("get_hit", |b| {
        let cache = RoutingCache::in_memory(1024, Duration::from_secs(60));
        let key = fingerprint("prompt", "code_generation", Some("rust"), "developer", None);
        let decision = RoutingDecision {
            provider: "openai".to_string(),
            model_id: "model-0".to_string(),
            persona: PersonaId::Developer,
            confidence: 0.9,
            reasoning: "bench".to_string(),
            scoring_breakdown: ScoringBreakdown::default(),
            metadata: Default::default(),
        };
        rt.block_on(cache.put(&key, decision));
        b.to_async(&rt).iter(|| {
            let cache = &cache;
            let key = key.clone();
            async move { black_box(cache.get(&key).await) }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_router_scoring, bench_quantum_collapse, bench_routing_cache);
criterion_main!(benches);
