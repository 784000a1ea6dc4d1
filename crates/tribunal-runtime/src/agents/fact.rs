//! Fact verification seat.

use async_trait::async_trait;
use std::sync::Arc;
use tribunal_core::{EvaluatorRole, VoteOutcome};

use super::{routed_vote, Evaluator};
use crate::providers::Provider;
use crate::router::BackendRouter;

/// Checks factual accuracy against the reference context. Unsupported or
/// contradicted claims lower the score.
#[derive(Debug, Clone)]
pub struct FactEvaluator {
    router: Arc<BackendRouter>,
    preferred: Provider,
}

impl FactEvaluator {
    pub fn new(router: Arc<BackendRouter>) -> Self {
        Self {
            router,
            preferred: Provider::PrimaryCloud,
        }
    }

    pub fn with_preferred(mut self, provider: Provider) -> Self {
        self.preferred = provider;
        self
    }
}

#[async_trait]
impl Evaluator for FactEvaluator {
    fn role(&self) -> EvaluatorRole {
        EvaluatorRole::Fact
    }

    fn preferred_provider(&self) -> Option<Provider> {
        Some(self.preferred)
    }

    async fn evaluate(&self, text: &str, context: Option<&str>) -> VoteOutcome {
        routed_vote(&self.router, EvaluatorRole::Fact, self.preferred, text, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::FixedProvider;

    #[tokio::test]
    async fn test_counted_vote_from_primary() {
        let router = BackendRouter::builder()
            .provider(
                Provider::PrimaryCloud,
                Arc::new(FixedProvider::new(r#"{"score": 85, "confidence": 0.9, "feedback": "Accurate."}"#)),
            )
            .build();
        let evaluator = FactEvaluator::new(Arc::new(router));

        let outcome = evaluator.evaluate("The Earth orbits the Sun.", Some("Astronomy notes")).await;
        assert!(!outcome.is_sentinel());
        assert_eq!(outcome.vote().score, 85.0);
        assert_eq!(outcome.vote().role, EvaluatorRole::Fact);
    }

    #[tokio::test]
    async fn test_no_providers_gives_sentinel() {
        let evaluator = FactEvaluator::new(Arc::new(BackendRouter::builder().build()));

        let outcome = evaluator.evaluate("text", None).await;
        match outcome {
            VoteOutcome::Sentinel { vote, cause } => {
                assert_eq!(vote.score, 0.0);
                assert_eq!(vote.confidence, 0.0);
                assert_eq!(vote.reasoning, tribunal_core::types::SENTINEL_REASONING);
                assert!(cause.contains("All providers unavailable"));
            }
            other => panic!("expected sentinel, got {:?}", other),
        }
    }
}
