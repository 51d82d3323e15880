//! AI Request Orchestration Core — smoke-test CLI
//!
//! A small interactive driver over [`orchestrator_core::OrchestratorContext`],
//! useful for exercising routing/execution by hand. The HTTP server that
//! embeds this core in production is out of scope here (spec §6: ingress is
//! a library surface, not a service).

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use orchestrator_core::domain::{Request, TaskType};
use orchestrator_core::provider::{MockAdapter, OpenAiCompatibleAdapter, ProviderAdapter, RateLimitedAdapter};
use orchestrator_core::{Config, ModelRegistry, OrchestratorContext};

/// Logs to stdout plus a daily-rolling file under `logs/` so a routing
/// decision can be traced after the process has exited. The returned guard
/// must stay alive for the process lifetime or the non-blocking file writer
/// drops pending lines on exit.
fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily("logs", "orchestrator_core.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);
    let file_layer = fmt::layer().with_ansi(false).with_writer(file_writer);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guard
}

fn build_providers() -> HashMap<String, Arc<dyn ProviderAdapter>> {
    let mut providers: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();

    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        providers.insert(
            "openai".to_string(),
            Arc::new(RateLimitedAdapter::new(
                OpenAiCompatibleAdapter::new("openai", "https://api.openai.com/v1", Some(key)),
                60,
            )),
        );
    }
    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        providers.insert(
            "anthropic".to_string(),
            Arc::new(RateLimitedAdapter::new(
                OpenAiCompatibleAdapter::new("anthropic", "https://api.anthropic.com/v1", Some(key)),
                60,
            )),
        );
    }

    // Always register a deterministic fallback so the CLI is usable without
    // any provider credentials configured.
    providers
        .entry("mock".to_string())
        .or_insert_with(|| Arc::new(MockAdapter::new("mock", "This is a mock response.")));

    providers
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    let _logging_guard = init_logging();

    let config = Config::from_env();
    let manifest = std::fs::read_to_string(&config.model_manifest_path)
        .unwrap_or_else(|_| include_str!("../resources/models.json").to_string());
    let registry = ModelRegistry::from_manifest_json(&manifest)?;
    info!("loaded {} models into the registry", registry.len());

    let providers = build_providers();
    let ctx = Arc::new(OrchestratorContext::new(config, registry, providers));
    ctx.install_dqn_agent().await;

    println!("orchestrator_core CLI — type a prompt, or 'debug <prompt>' / 'quit'");

    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }

        if let Some(prompt) = line.strip_prefix("debug ") {
            let request = Request::new(prompt, TaskType::Custom);
            match ctx.debug_route(&request) {
                Ok(info) => println!(
                    "{} / {}  persona={:?}  confidence={:.3}\n  {}",
                    info.routing_decision.provider,
                    info.routing_decision.model_id,
                    info.routing_decision.persona,
                    info.routing_decision.confidence,
                    info.routing_decision.reasoning,
                ),
                Err(err) => println!("routing failed: {err}"),
            }
            continue;
        }

        let request = Request::new(line, TaskType::Custom);
        let result = ctx.orchestrate(&request).await;
        match (result.result, result.error) {
            (Some(outcome), _) => println!("{}", outcome.response.text),
            (None, Some(err)) => println!("error: {err}"),
            (None, None) => println!("no result and no error — this should not happen"),
        }
    }

    Ok(())
}
