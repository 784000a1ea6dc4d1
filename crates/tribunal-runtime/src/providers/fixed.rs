//! Fixed-response provider for offline runs and dry runs.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

use super::{
    factory::ProviderFactory, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider,
    ProviderError, TokenUsage,
};

/// Response returned when none is configured.
pub const DEFAULT_FIXED_RESPONSE: &str = r#"{"score": 75, "confidence": 0.8, "feedback": "Offline evaluation: no scoring backend was contacted.", "reasoning": "fixed response"}"#;

/// Provider that answers every request with the same text.
#[derive(Debug, Clone)]
pub struct FixedProvider {
    response: String,
    healthy: bool,
    delay: Duration,
}

impl FixedProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            healthy: true,
            delay: Duration::ZERO,
        }
    }

    /// Simulated per-call latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_health(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        FixedProviderFactory.validate_config(config)?;

        let response = config["response"]
            .as_str()
            .unwrap_or(DEFAULT_FIXED_RESPONSE);
        let healthy = config["healthy"].as_bool().unwrap_or(true);
        let delay = Duration::from_millis(config["delay_ms"].as_u64().unwrap_or(0));

        Ok(Self::new(response).with_health(healthy).with_delay(delay))
    }
}

impl Default for FixedProvider {
    fn default() -> Self {
        Self::new(DEFAULT_FIXED_RESPONSE)
    }
}

#[async_trait]
impl LlmProvider for FixedProvider {
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        Ok(CompletionResponse {
            content: self.response.clone(),
            usage: TokenUsage::default(),
            model: config.model.clone().unwrap_or_else(|| "fixed".to_string()),
            stop_reason: Some("end_turn".to_string()),
        })
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Factory for fixed providers.
///
/// ## Configuration Format
/// ```json
/// {
///   "response": "{\"score\": 80}",   // Optional, text returned on every call
///   "healthy": true,                 // Optional, health check result
///   "delay_ms": 0                    // Optional, simulated latency
/// }
/// ```
pub struct FixedProviderFactory;

impl ProviderFactory for FixedProviderFactory {
    fn provider_type(&self) -> &'static str {
        "fixed"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(FixedProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        let checks = [
            ("response", config["response"].is_null() || config["response"].is_string()),
            ("healthy", config["healthy"].is_null() || config["healthy"].is_boolean()),
            ("delay_ms", config["delay_ms"].is_null() || config["delay_ms"].is_u64()),
        ];

        match checks.iter().find(|(_, ok)| !ok) {
            Some((key, _)) => Err(ProviderError::NotConfigured(format!(
                "fixed provider: '{}' has the wrong type",
                key
            ))),
            None => Ok(()),
        }
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "response": DEFAULT_FIXED_RESPONSE,
            "healthy": true,
            "delay_ms": 0
        })
    }

    fn description(&self) -> &'static str {
        "Fixed-response provider for offline and dry runs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_configured_response() {
        let provider = FixedProvider::from_config(&serde_json::json!({
            "response": "{\"score\": 91}"
        }))
        .unwrap();

        let response = provider
            .complete(vec![ChatMessage::user("hi")], &CompletionConfig::default())
            .await
            .unwrap();
        assert_eq!(response.content, "{\"score\": 91}");
        assert!(provider.health_check().await);
    }

    #[tokio::test]
    async fn test_unhealthy_flag() {
        let provider = FixedProvider::from_config(&serde_json::json!({ "healthy": false })).unwrap();
        assert!(!provider.health_check().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_delay() {
        let provider = FixedProvider::default().with_delay(Duration::from_millis(250));
        let start = tokio::time::Instant::now();
        provider
            .complete(vec![], &CompletionConfig::default())
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let result = FixedProviderFactory.validate_config(&serde_json::json!({ "delay_ms": "slow" }));
        assert!(matches!(result, Err(ProviderError::NotConfigured(msg)) if msg.contains("delay_ms")));
    }
}
