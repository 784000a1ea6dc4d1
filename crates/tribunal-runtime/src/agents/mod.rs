//! The council's evaluators.
//!
//! Three evaluators route a prompt through the [`BackendRouter`]; the
//! integrity evaluator scores locally with heuristic scorers. All four
//! share one contract: [`Evaluator::evaluate`] never fails, and a failure
//! is carried out as a sentinel [`VoteOutcome`].

mod critical;
mod fact;
mod integrity;
mod response;
mod structure;

pub use critical::CriticalEvaluator;
pub use fact::FactEvaluator;
pub use integrity::IntegrityEvaluator;
pub use response::{parse_response, DEFAULT_CONFIDENCE, NEUTRAL_SCORE, UNSTRUCTURED_REASONING};
pub use structure::StructureEvaluator;

use async_trait::async_trait;
use tokio::time::Instant;
use tribunal_core::{EvaluatorRole, Vote, VoteOutcome};

use crate::prompts;
use crate::providers::Provider;
use crate::router::BackendRouter;

/// One council seat.
///
/// # Isolation Contract
/// - MUST NOT see other evaluators' votes
/// - MUST NOT share mutable state with other evaluators
/// - MUST return a vote for its own role, sentinel on failure
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// The seat this evaluator fills.
    fn role(&self) -> EvaluatorRole;

    /// Provider tried first, for routed evaluators.
    fn preferred_provider(&self) -> Option<Provider> {
        None
    }

    /// Score `text`, optionally against reference `context`.
    async fn evaluate(&self, text: &str, context: Option<&str>) -> VoteOutcome;
}

/// Shared body of the routed evaluators: prompt, route, time, parse.
pub(crate) async fn routed_vote(
    router: &BackendRouter,
    role: EvaluatorRole,
    preferred: Provider,
    text: &str,
    context: Option<&str>,
) -> VoteOutcome {
    let system = prompts::system_prompt(role);
    let prompt = prompts::evaluation_prompt(role, text, context);

    let start = Instant::now();
    let result = router.route(&prompt, &system, preferred).await;
    let latency = start.elapsed();

    match result {
        Ok(raw) => VoteOutcome::Counted(response::parse_response(role, &raw).with_latency(latency)),
        Err(e) => {
            tracing::warn!(role = %role, error = %e, "Evaluator failed, recording sentinel vote");
            let cause = e.to_string();
            VoteOutcome::Sentinel {
                vote: Vote::sentinel(role, &cause).with_latency(latency),
                cause,
            }
        }
    }
}
