//! Bluff and fabrication seat.

use async_trait::async_trait;
use std::sync::Arc;
use tribunal_core::{EvaluatorRole, VoteOutcome};

use super::{routed_vote, Evaluator};
use crate::providers::Provider;
use crate::router::BackendRouter;

/// Looks for vague, circular or invented content. High scores mean the
/// answer is genuine; low scores mean it is evasive.
#[derive(Debug, Clone)]
pub struct CriticalEvaluator {
    router: Arc<BackendRouter>,
    preferred: Provider,
}

impl CriticalEvaluator {
    pub fn new(router: Arc<BackendRouter>) -> Self {
        Self {
            router,
            preferred: Provider::SecondaryCloud,
        }
    }

    pub fn with_preferred(mut self, provider: Provider) -> Self {
        self.preferred = provider;
        self
    }
}

#[async_trait]
impl Evaluator for CriticalEvaluator {
    fn role(&self) -> EvaluatorRole {
        EvaluatorRole::Critical
    }

    fn preferred_provider(&self) -> Option<Provider> {
        Some(self.preferred)
    }

    async fn evaluate(&self, text: &str, context: Option<&str>) -> VoteOutcome {
        routed_vote(&self.router, EvaluatorRole::Critical, self.preferred, text, context).await
    }
}
