//! The evaluation engine: council, profile lookup and synthesis.
//!
//! # Execution Flow
//! 1. Reject empty submissions
//! 2. Fan-out: the council runs all four seats concurrently
//! 3. Resolve the weighting profile (equal weights if lookup fails)
//! 4. Fan-in: deterministic synthesis into a [`FinalEvaluation`]

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use tribunal_core::{ConsensusSynthesizer, FinalEvaluation, GradingPolicy, SynthesisError, WeightingProfile};

use crate::cache::VoteCache;
use crate::config::{ConfigError, EngineConfig, RuntimeConfig};
use crate::orchestrator::{AgentStatus, CouncilOrchestrator};
use crate::persona::{PersonaProvider, PolicyPersonaProvider};
use crate::providers::{Provider, ProviderRegistry};
use crate::resilience::CircuitSnapshot;
use crate::router::BackendRouter;

/// Errors returned to callers of the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

/// One submission in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub text: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub profile_id: Option<String>,
}

impl Submission {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
            profile_id: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }
}

/// Snapshot of the engine for status output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub evaluators: Vec<AgentStatus>,
    pub circuits: Vec<CircuitSnapshot>,
    /// Backend name per configured slot.
    pub backends: BTreeMap<Provider, String>,
}

/// Evaluates submissions end to end.
pub struct Engine {
    council: CouncilOrchestrator,
    synthesizer: ConsensusSynthesizer,
    personas: Arc<dyn PersonaProvider>,
    config: EngineConfig,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Build the router, council and persona lookup from configuration.
    pub fn from_config(config: &RuntimeConfig, policy: GradingPolicy) -> Result<Self, ConfigError> {
        let router = BackendRouter::from_config(config, &ProviderRegistry::with_defaults())?;

        let mut builder = Self::builder()
            .router(Arc::new(router))
            .policy(policy)
            .config(config.engine.clone());
        if config.cache.enabled {
            builder = builder.cache(VoteCache::from_config(&config.cache));
        }

        builder
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Evaluate one submission.
    ///
    /// `profile_id` falls back to the configured default profile, then to
    /// the policy's default mode.
    pub async fn evaluate(
        &self,
        text: &str,
        context: Option<&str>,
        profile_id: Option<&str>,
    ) -> Result<FinalEvaluation, EvaluationError> {
        if text.trim().is_empty() {
            return Err(EvaluationError::InvalidInput(
                "submission text is empty".to_string(),
            ));
        }

        let votes = self.council.evaluate(text, context).await;
        let profile = self.resolve_profile(profile_id).await;
        let evaluation = self.synthesizer.synthesize(&votes, &profile)?;

        tracing::info!(
            profile = %evaluation.profile_id,
            grade = evaluation.final_grade,
            letter = %evaluation.letter_grade,
            method = ?evaluation.consensus_method,
            latency = ?votes.total_latency,
            "Evaluation complete"
        );

        Ok(evaluation)
    }

    /// Evaluate many submissions, at most `batch_concurrency` councils at a
    /// time. Results keep input order.
    pub async fn evaluate_batch(
        &self,
        submissions: Vec<Submission>,
    ) -> Vec<Result<FinalEvaluation, EvaluationError>> {
        let concurrency = self.config.batch_concurrency.max(1);

        stream::iter(submissions)
            .map(|submission| async move {
                self.evaluate(
                    &submission.text,
                    submission.context.as_deref(),
                    submission.profile_id.as_deref(),
                )
                .await
            })
            .buffered(concurrency)
            .collect()
            .await
    }

    async fn resolve_profile(&self, profile_id: Option<&str>) -> WeightingProfile {
        let id = profile_id
            .or(self.config.default_profile.as_deref())
            .unwrap_or(self.synthesizer.policy().default_mode.as_str());

        match self.personas.get(id).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(profile = id, error = %e, "Profile lookup failed, using equal weights");
                WeightingProfile::equal_weights()
            }
        }
    }

    pub async fn status(&self) -> EngineStatus {
        let router = self.council.router();
        let backends = crate::providers::FALLBACK_CHAIN
            .iter()
            .filter_map(|p| router.backend_name(*p).map(|name| (*p, name.to_string())))
            .collect();

        EngineStatus {
            evaluators: self.council.agent_status().await,
            circuits: router.circuit_snapshots(),
            backends,
        }
    }

    /// Provider health, probed concurrently.
    pub async fn health_check(&self) -> BTreeMap<Provider, bool> {
        self.council.router().health_check().await
    }

    pub fn router(&self) -> &Arc<BackendRouter> {
        self.council.router()
    }

    pub fn policy(&self) -> &GradingPolicy {
        self.synthesizer.policy()
    }
}

/// Builder for Engine.
pub struct EngineBuilder {
    router: Option<Arc<BackendRouter>>,
    council: Option<CouncilOrchestrator>,
    policy: Option<GradingPolicy>,
    personas: Option<Arc<dyn PersonaProvider>>,
    cache: Option<VoteCache>,
    config: EngineConfig,
}

/// Errors building an engine.
#[derive(Error, Debug)]
pub enum EngineBuildError {
    #[error("No router or council configured")]
    MissingRouter,

    #[error("Built-in policy failed to load: {0}")]
    Policy(#[from] tribunal_core::PolicyError),
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            router: None,
            council: None,
            policy: None,
            personas: None,
            cache: None,
            config: EngineConfig::default(),
        }
    }

    /// Router for a council with the standard evaluators.
    pub fn router(mut self, router: Arc<BackendRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// A fully built council; takes precedence over `router` and `cache`.
    pub fn council(mut self, council: CouncilOrchestrator) -> Self {
        self.council = Some(council);
        self
    }

    /// Grading policy; the built-in policy when unset.
    pub fn policy(mut self, policy: GradingPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Profile lookup; the policy's modes and personas when unset.
    pub fn personas(mut self, personas: Arc<dyn PersonaProvider>) -> Self {
        self.personas = Some(personas);
        self
    }

    pub fn cache(mut self, cache: VoteCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Engine, EngineBuildError> {
        let council = match (self.council, self.router) {
            (Some(council), _) => council,
            (None, Some(router)) => {
                let mut builder = CouncilOrchestrator::builder(router);
                if let Some(cache) = self.cache {
                    builder = builder.cache(cache);
                }
                builder.build()
            }
            (None, None) => return Err(EngineBuildError::MissingRouter),
        };

        let policy = match self.policy {
            Some(policy) => policy,
            None => GradingPolicy::builtin()?,
        };

        let personas = self
            .personas
            .unwrap_or_else(|| Arc::new(PolicyPersonaProvider::new(Arc::new(policy.clone()))));

        Ok(Engine {
            council,
            synthesizer: ConsensusSynthesizer::new(policy),
            personas,
            config: self.config,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
