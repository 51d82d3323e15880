//! AI Request Orchestration Core
//!
//! Routes inbound requests across heterogeneous model providers: scores
//! candidates on complexity/context/capability fit, runs multiple routing
//! strategies concurrently and collapses them into one decision, learns a
//! routing policy online via a DQN agent, and coordinates the specialist
//! agents a request may fan out to.

pub mod agents;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod learning;
pub mod metrics;
pub mod orchestrate;
pub mod provider;
pub mod quantum;
pub mod registry;
pub mod router;
pub mod routing_manager;

pub use config::Config;
pub use domain::{Request, RoutingDecision, TaskType};
pub use error::{OrchestratorError, Result};
pub use orchestrate::{DebugInfo, OrchestrationResult, OrchestratorContext};
pub use registry::ModelRegistry;
