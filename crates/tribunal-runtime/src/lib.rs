//! # tribunal-runtime
//!
//! Async council runtime for Tribunal.
//!
//! This crate does everything that touches the network or the clock:
//! - routes prompts to scoring providers with per-provider circuit
//!   breaking and failover ([`BackendRouter`])
//! - runs the four evaluators concurrently ([`CouncilOrchestrator`])
//! - looks up weighting profiles ([`PersonaProvider`])
//! - ties it all to the deterministic synthesizer in `tribunal-core`
//!   ([`Engine`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use tribunal_core::GradingPolicy;
//! use tribunal_runtime::{Engine, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_file("tribunal.yaml")?;
//! let engine = Engine::from_config(&config, GradingPolicy::builtin()?)?;
//!
//! let result = engine
//!     .evaluate("Photosynthesis converts light...", Some(notes), Some("strict"))
//!     .await?;
//! println!("{} {}", result.final_grade, result.letter_grade);
//! ```
//!
//! ## Features
//!
//! Network providers are opt-in: `anthropic`, `openai`, `local` (Ollama),
//! or `all-providers`. The `fixed` provider is always available.

pub mod agents;
pub mod cache;
pub mod config;
pub mod engine;
pub mod orchestrator;
pub mod persona;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod router;

pub use agents::{
    CriticalEvaluator, Evaluator, FactEvaluator, IntegrityEvaluator, StructureEvaluator,
};
pub use cache::{VoteCache, VoteKey};
pub use config::{ConfigError, RuntimeConfig};
pub use engine::{Engine, EngineBuilder, EngineStatus, EvaluationError, Submission};
pub use orchestrator::{AgentBackend, AgentStatus, CouncilOrchestrator};
pub use persona::{PersonaError, PersonaProvider, PolicyPersonaProvider, StaticPersonaProvider};
pub use providers::{LlmProvider, Provider, ProviderError, ProviderRegistry};
pub use resilience::{CircuitBreakerConfig, CircuitSnapshot, CircuitState};
pub use router::{BackendRouter, RouterError};
