//! Structure and grammar seat.

use async_trait::async_trait;
use std::sync::Arc;
use tribunal_core::{EvaluatorRole, VoteOutcome};

use super::{routed_vote, Evaluator};
use crate::providers::Provider;
use crate::router::BackendRouter;

/// Judges organization, grammar and clarity. Prefers the local provider
/// and never sends the reference context.
#[derive(Debug, Clone)]
pub struct StructureEvaluator {
    router: Arc<BackendRouter>,
    preferred: Provider,
}

impl StructureEvaluator {
    pub fn new(router: Arc<BackendRouter>) -> Self {
        Self {
            router,
            preferred: Provider::Local,
        }
    }

    pub fn with_preferred(mut self, provider: Provider) -> Self {
        self.preferred = provider;
        self
    }
}

#[async_trait]
impl Evaluator for StructureEvaluator {
    fn role(&self) -> EvaluatorRole {
        EvaluatorRole::Structure
    }

    fn preferred_provider(&self) -> Option<Provider> {
        Some(self.preferred)
    }

    async fn evaluate(&self, text: &str, _context: Option<&str>) -> VoteOutcome {
        routed_vote(&self.router, EvaluatorRole::Structure, self.preferred, text, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        ChatMessage, CompletionConfig, CompletionResponse, FixedProvider, LlmProvider,
        ProviderError, TokenUsage,
    };

    /// Fails the test if the context leaks into the prompt.
    struct ContextSniffer;

    #[async_trait]
    impl LlmProvider for ContextSniffer {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            let leaked = messages.iter().any(|m| m.content.contains("CONFIDENTIAL"));
            Ok(CompletionResponse {
                content: format!("{{\"score\": {}}}", if leaked { 0 } else { 77 }),
                usage: TokenUsage::default(),
                model: "sniffer".to_string(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "sniffer"
        }
    }

    #[tokio::test]
    async fn test_context_not_sent() {
        let router = BackendRouter::builder()
            .provider(Provider::Local, Arc::new(ContextSniffer))
            .build();
        let evaluator = StructureEvaluator::new(Arc::new(router));

        let outcome = evaluator.evaluate("Well organized text.", Some("CONFIDENTIAL notes")).await;
        assert_eq!(outcome.vote().score, 77.0);
    }

    #[tokio::test]
    async fn test_falls_back_to_cloud_without_local() {
        let router = BackendRouter::builder()
            .provider(Provider::PrimaryCloud, Arc::new(FixedProvider::new(r#"{"score": 64}"#)))
            .build();
        let evaluator = StructureEvaluator::new(Arc::new(router));

        assert_eq!(evaluator.preferred_provider(), Some(Provider::Local));
        assert_eq!(evaluator.evaluate("text", None).await.vote().score, 64.0);
    }
}
