//! Council orchestrator: runs the four evaluators concurrently.
//!
//! - Parallel fan-out to all four seats via `tokio::join!` in the caller's
//!   task, so dropping the future cancels every seat
//! - Each branch is guarded: a panic inside an evaluator becomes a
//!   sentinel vote for that seat
//! - Fan-in is by role, never by completion order

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;

use tribunal_core::{CouncilVotes, EvaluatorRole, VoteOutcome};

use crate::agents::{
    CriticalEvaluator, Evaluator, FactEvaluator, IntegrityEvaluator, StructureEvaluator,
};
use crate::cache::{VoteCache, VoteKey};
use crate::providers::Provider;
use crate::router::BackendRouter;

/// What is actually producing a seat's votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentBackend {
    /// A cloud provider
    Remote,
    /// The local provider, reachable
    Local,
    /// Prefers the local provider, which is unreachable; served by cloud
    CloudFallback,
    /// In-process heuristic scorers
    Heuristic,
}

/// Status of one seat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub role: EvaluatorRole,
    pub name: String,
    pub label: String,
    pub preferred_provider: Option<Provider>,
    pub backend: AgentBackend,
}

/// Runs the council.
pub struct CouncilOrchestrator {
    fact: Arc<dyn Evaluator>,
    structure: Arc<dyn Evaluator>,
    critical: Arc<dyn Evaluator>,
    integrity: Arc<dyn Evaluator>,
    router: Arc<BackendRouter>,
    cache: Option<VoteCache>,
}

impl CouncilOrchestrator {
    /// Council with the standard evaluators on `router`.
    pub fn new(router: Arc<BackendRouter>) -> Self {
        CouncilOrchestratorBuilder::new(router).build()
    }

    pub fn builder(router: Arc<BackendRouter>) -> CouncilOrchestratorBuilder {
        CouncilOrchestratorBuilder::new(router)
    }

    /// Evaluate `text` with all four seats.
    ///
    /// Always returns exactly four votes in role order. `total_latency`
    /// covers the whole concurrent batch.
    pub async fn evaluate(&self, text: &str, context: Option<&str>) -> CouncilVotes {
        let start = Instant::now();

        let (fact, structure, critical, integrity) = tokio::join!(
            self.run_seat(EvaluatorRole::Fact, &self.fact, text, context),
            self.run_seat(EvaluatorRole::Structure, &self.structure, text, context),
            self.run_seat(EvaluatorRole::Critical, &self.critical, text, context),
            self.run_seat(EvaluatorRole::Integrity, &self.integrity, text, context),
        );

        let votes = CouncilVotes {
            fact: fact.into_vote(),
            structure: structure.into_vote(),
            critical: critical.into_vote(),
            integrity: integrity.into_vote(),
            total_latency: start.elapsed(),
        };

        tracing::debug!(
            total_latency = ?votes.total_latency,
            fact = votes.fact.score,
            structure = votes.structure.score,
            critical = votes.critical.score,
            integrity = votes.integrity.score,
            "Council finished"
        );

        votes
    }

    async fn run_seat(
        &self,
        role: EvaluatorRole,
        evaluator: &Arc<dyn Evaluator>,
        text: &str,
        context: Option<&str>,
    ) -> VoteOutcome {
        let key = VoteKey::new(role, text, context);
        if let Some(cache) = &self.cache {
            if let Some(vote) = cache.get(&key).await {
                tracing::debug!(role = %role, "Vote cache hit");
                return VoteOutcome::Counted(vote);
            }
        }

        let outcome = AssertUnwindSafe(evaluator.evaluate(text, context))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let cause = format!("evaluator panicked: {}", panic_message(&*panic));
                tracing::warn!(role = %role, error = %cause, "Evaluator panicked, recording sentinel vote");
                VoteOutcome::sentinel(role, cause)
            });

        if let Some(cache) = &self.cache {
            cache.insert(key, &outcome).await;
        }

        outcome
    }

    /// Per-seat status in role order. Probes local availability on first
    /// use.
    pub async fn agent_status(&self) -> Vec<AgentStatus> {
        let local_available = self.router.is_local_available().await;

        let mut statuses = Vec::with_capacity(4);
        for (role, evaluator) in self.seats() {
            let preferred = evaluator.preferred_provider();
            let backend = match preferred {
                None => AgentBackend::Heuristic,
                Some(p) if p.is_local() && local_available => AgentBackend::Local,
                Some(p) if p.is_local() => AgentBackend::CloudFallback,
                Some(_) => AgentBackend::Remote,
            };

            statuses.push(AgentStatus {
                role,
                name: role.evaluator_name().to_string(),
                label: role.label().to_string(),
                preferred_provider: preferred,
                backend,
            });
        }
        statuses
    }

    fn seats(&self) -> [(EvaluatorRole, &Arc<dyn Evaluator>); 4] {
        [
            (EvaluatorRole::Fact, &self.fact),
            (EvaluatorRole::Structure, &self.structure),
            (EvaluatorRole::Critical, &self.critical),
            (EvaluatorRole::Integrity, &self.integrity),
        ]
    }

    pub fn router(&self) -> &Arc<BackendRouter> {
        &self.router
    }

    pub fn cache(&self) -> Option<&VoteCache> {
        self.cache.as_ref()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder for CouncilOrchestrator.
pub struct CouncilOrchestratorBuilder {
    router: Arc<BackendRouter>,
    fact: Option<Arc<dyn Evaluator>>,
    structure: Option<Arc<dyn Evaluator>>,
    critical: Option<Arc<dyn Evaluator>>,
    integrity: Option<Arc<dyn Evaluator>>,
    cache: Option<VoteCache>,
}

impl CouncilOrchestratorBuilder {
    pub fn new(router: Arc<BackendRouter>) -> Self {
        Self {
            router,
            fact: None,
            structure: None,
            critical: None,
            integrity: None,
            cache: None,
        }
    }

    /// Seat an evaluator in the role it reports, replacing the default.
    pub fn evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        let slot = match evaluator.role() {
            EvaluatorRole::Fact => &mut self.fact,
            EvaluatorRole::Structure => &mut self.structure,
            EvaluatorRole::Critical => &mut self.critical,
            EvaluatorRole::Integrity => &mut self.integrity,
        };
        *slot = Some(evaluator);
        self
    }

    pub fn cache(mut self, cache: VoteCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> CouncilOrchestrator {
        let router = self.router;
        CouncilOrchestrator {
            fact: self
                .fact
                .unwrap_or_else(|| Arc::new(FactEvaluator::new(router.clone()))),
            structure: self
                .structure
                .unwrap_or_else(|| Arc::new(StructureEvaluator::new(router.clone()))),
            critical: self
                .critical
                .unwrap_or_else(|| Arc::new(CriticalEvaluator::new(router.clone()))),
            integrity: self
                .integrity
                .unwrap_or_else(|| Arc::new(IntegrityEvaluator::default())),
            router,
            cache: self.cache,
        }
    }
}
