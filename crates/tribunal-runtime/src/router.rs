//! Backend router with per-provider circuit breaking and failover.
//!
//! A call goes to the preferred provider first, then down
//! [`FALLBACK_CHAIN`], skipping providers with no backend and providers
//! whose circuit rejects the call. The first success wins.
//!
//! All state lives in one [`RouterState`] owned by the router; share the
//! router through an `Arc`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;

use crate::config::{CompletionSettings, RouterConfig, RuntimeConfig};
use crate::providers::{
    ChatMessage, LlmProvider, Provider, ProviderError, ProviderRegistry, FALLBACK_CHAIN,
};
use crate::resilience::{Admission, CircuitBreaker, CircuitSnapshot};

/// Errors from routing one call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("All providers unavailable")]
    AllProvidersUnavailable,

    #[error("Routing deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

const LOCAL_UNKNOWN: u8 = 0;
const LOCAL_DOWN: u8 = 1;
const LOCAL_UP: u8 = 2;

/// Mutable router state shared by every request.
#[derive(Debug)]
pub struct RouterState {
    circuits: CircuitBreaker,
    local_available: AtomicU8,
}

impl RouterState {
    fn new(config: &RouterConfig) -> Self {
        Self {
            circuits: CircuitBreaker::new(config.circuit.clone()),
            local_available: AtomicU8::new(LOCAL_UNKNOWN),
        }
    }
}

/// Routes prompts to scoring backends.
pub struct BackendRouter {
    providers: BTreeMap<Provider, Arc<dyn LlmProvider>>,
    config: RouterConfig,
    completion: CompletionSettings,
    state: RouterState,
}

impl BackendRouter {
    pub fn builder() -> BackendRouterBuilder {
        BackendRouterBuilder::new()
    }

    /// Build every configured slot through the registry.
    pub fn from_config(
        config: &RuntimeConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, crate::config::ConfigError> {
        let mut builder = Self::builder()
            .config(config.router.clone())
            .completion(config.completion.clone());

        for (&slot, slot_config) in &config.providers {
            let provider = registry
                .create(&slot_config.provider_type, &slot_config.settings_json())
                .map_err(|source| crate::config::ConfigError::Provider { slot, source })?;
            tracing::debug!(
                provider = %slot,
                backend = provider.name(),
                "Registered provider"
            );
            builder = builder.provider(slot, provider);
        }

        Ok(builder.build())
    }

    /// Send a prompt, failing over until one provider answers.
    pub async fn route(
        &self,
        prompt: &str,
        system_prompt: &str,
        preferred: Provider,
    ) -> Result<String, RouterError> {
        match self.config.route_deadline {
            Some(deadline) => {
                tokio::time::timeout(deadline, self.route_inner(prompt, system_prompt, preferred))
                    .await
                    .unwrap_or_else(|_| {
                        tracing::warn!(
                            preferred = %preferred,
                            deadline = ?deadline,
                            "Routing deadline exceeded"
                        );
                        Err(RouterError::DeadlineExceeded(deadline))
                    })
            }
            None => self.route_inner(prompt, system_prompt, preferred).await,
        }
    }

    async fn route_inner(
        &self,
        prompt: &str,
        system_prompt: &str,
        preferred: Provider,
    ) -> Result<String, RouterError> {
        let candidates = std::iter::once(preferred)
            .chain(FALLBACK_CHAIN.into_iter().filter(|p| *p != preferred));

        for provider in candidates {
            let Some(backend) = self.providers.get(&provider) else {
                continue;
            };

            let admission = self.state.circuits.admit(provider);
            if !admission.is_admitted() {
                tracing::debug!(provider = %provider, "Circuit open, skipping provider");
                continue;
            }

            match self.invoke(provider, backend.as_ref(), prompt, system_prompt).await {
                Ok(text) => {
                    self.state.circuits.record_success(provider);
                    if provider != preferred {
                        tracing::debug!(
                            preferred = %preferred,
                            provider = %provider,
                            "Served by fallback provider"
                        );
                    }
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %provider,
                        probe = admission == Admission::Probe,
                        error = %e,
                        "Provider call failed"
                    );
                    self.state.circuits.record_failure(provider);
                }
            }
        }

        Err(RouterError::AllProvidersUnavailable)
    }

    async fn invoke(
        &self,
        provider: Provider,
        backend: &dyn LlmProvider,
        prompt: &str,
        system_prompt: &str,
    ) -> Result<String, ProviderError> {
        let timeout = self.config.call_timeout(provider);
        let config = self.completion.to_completion_config(timeout);
        let messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(prompt)];

        match tokio::time::timeout(timeout, backend.complete(messages, &config)).await {
            Ok(result) => result.map(|response| response.content),
            Err(_) => Err(ProviderError::Timeout(timeout)),
        }
    }

    /// Whether the local provider answers. Probed once, then memoized.
    pub async fn is_local_available(&self) -> bool {
        match self.state.local_available.load(Ordering::Acquire) {
            LOCAL_UP => true,
            LOCAL_DOWN => false,
            _ => self.refresh_local_availability().await,
        }
    }

    /// Probe the local provider again and store the answer.
    pub async fn refresh_local_availability(&self) -> bool {
        let available = match self.providers.get(&Provider::Local) {
            Some(local) => tokio::time::timeout(self.config.probe_timeout, local.health_check())
                .await
                .unwrap_or(false),
            None => false,
        };

        self.state
            .local_available
            .store(if available { LOCAL_UP } else { LOCAL_DOWN }, Ordering::Release);
        tracing::debug!(available, "Local provider availability probed");
        available
    }

    /// Forget the memoized answer; the next check probes again.
    pub fn invalidate_local_availability(&self) {
        self.state
            .local_available
            .store(LOCAL_UNKNOWN, Ordering::Release);
    }

    /// Per-provider health, probed concurrently. Circuit state is not
    /// consulted.
    pub async fn health_check(&self) -> BTreeMap<Provider, bool> {
        let probe_timeout = self.config.probe_timeout;
        let probes = FALLBACK_CHAIN.into_iter().map(|provider| async move {
            let healthy = match self.providers.get(&provider) {
                Some(backend) => tokio::time::timeout(probe_timeout, backend.health_check())
                    .await
                    .unwrap_or(false),
                None => false,
            };
            (provider, healthy)
        });

        join_all(probes).await.into_iter().collect()
    }

    pub fn has_provider(&self, provider: Provider) -> bool {
        self.providers.contains_key(&provider)
    }

    /// Backend name serving a slot.
    pub fn backend_name(&self, provider: Provider) -> Option<&str> {
        self.providers.get(&provider).map(|p| p.name())
    }

    pub fn circuit_snapshot(&self, provider: Provider) -> CircuitSnapshot {
        self.state.circuits.snapshot(provider)
    }

    /// Snapshots in fallback order.
    pub fn circuit_snapshots(&self) -> Vec<CircuitSnapshot> {
        FALLBACK_CHAIN
            .iter()
            .map(|p| self.state.circuits.snapshot(*p))
            .collect()
    }

    pub fn reset_circuit(&self, provider: Provider) {
        self.state.circuits.reset(provider);
    }

    pub fn reset_all_circuits(&self) {
        self.state.circuits.reset_all();
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}

impl std::fmt::Debug for BackendRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRouter")
            .field(
                "providers",
                &self
                    .providers
                    .iter()
                    .map(|(slot, p)| (slot.as_str(), p.name()))
                    .collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

/// Builder for BackendRouter.
pub struct BackendRouterBuilder {
    providers: BTreeMap<Provider, Arc<dyn LlmProvider>>,
    config: RouterConfig,
    completion: CompletionSettings,
}

impl BackendRouterBuilder {
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
            config: RouterConfig::default(),
            completion: CompletionSettings::default(),
        }
    }

    /// Fill a slot, replacing any earlier backend.
    pub fn provider(mut self, slot: Provider, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(slot, provider);
        self
    }

    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn completion(mut self, completion: CompletionSettings) -> Self {
        self.completion = completion;
        self
    }

    pub fn build(self) -> BackendRouter {
        let state = RouterState::new(&self.config);
        BackendRouter {
            providers: self.providers,
            config: self.config,
            completion: self.completion,
            state,
        }
    }
}

impl Default for BackendRouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CompletionConfig, CompletionResponse, FixedProvider, TokenUsage};
    use crate::resilience::{CircuitBreakerConfig, CircuitState};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Always fails, counting calls.
    #[derive(Default)]
    struct FailingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for FailingProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::ApiError {
                status: 503,
                message: "overloaded".to_string(),
            })
        }

        async fn health_check(&self) -> bool {
            false
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Echoes the system prompt so tests can see what was sent.
    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: messages
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("|"),
                usage: TokenUsage::default(),
                model: "echo".to_string(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn fixed(text: &str) -> Arc<dyn LlmProvider> {
        Arc::new(FixedProvider::new(text))
    }

    fn with_threshold(threshold: u32) -> RouterConfig {
        RouterConfig {
            circuit: CircuitBreakerConfig {
                failure_threshold: threshold,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_preferred_provider_answers() {
        let router = BackendRouter::builder()
            .provider(Provider::PrimaryCloud, fixed("primary"))
            .provider(Provider::Local, fixed("local"))
            .build();

        let text = router.route("p", "s", Provider::Local).await.unwrap();
        assert_eq!(text, "local");
    }

    #[tokio::test]
    async fn test_messages_carry_system_and_prompt() {
        let router = BackendRouter::builder()
            .provider(Provider::PrimaryCloud, Arc::new(EchoProvider))
            .build();

        let text = router
            .route("the prompt", "the system", Provider::PrimaryCloud)
            .await
            .unwrap();
        assert_eq!(text, "the system|the prompt");
    }

    #[tokio::test]
    async fn test_fails_over_in_chain_order() {
        let failing = Arc::new(FailingProvider::default());
        let router = BackendRouter::builder()
            .provider(Provider::SecondaryCloud, failing.clone())
            .provider(Provider::TertiaryCloud, fixed("tertiary"))
            .provider(Provider::Local, fixed("local"))
            .build();

        let text = router.route("p", "s", Provider::SecondaryCloud).await.unwrap();
        assert_eq!(text, "tertiary");
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            router.circuit_snapshot(Provider::SecondaryCloud).failure_count,
            1
        );
    }

    #[tokio::test]
    async fn test_unregistered_slots_are_skipped_untouched() {
        let router = BackendRouter::builder()
            .provider(Provider::Local, fixed("local"))
            .build();

        assert_eq!(router.route("p", "s", Provider::PrimaryCloud).await.unwrap(), "local");
        assert_eq!(router.circuit_snapshot(Provider::PrimaryCloud).failure_count, 0);
    }

    #[tokio::test]
    async fn test_all_unavailable() {
        let router = BackendRouter::builder()
            .provider(Provider::PrimaryCloud, Arc::new(FailingProvider::default()))
            .provider(Provider::Local, Arc::new(FailingProvider::default()))
            .build();

        assert_eq!(
            router.route("p", "s", Provider::PrimaryCloud).await,
            Err(RouterError::AllProvidersUnavailable)
        );

        let empty = BackendRouter::builder().build();
        assert_eq!(
            empty.route("p", "s", Provider::Local).await,
            Err(RouterError::AllProvidersUnavailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_skipped_until_recovery() {
        let failing = Arc::new(FailingProvider::default());
        let router = BackendRouter::builder()
            .config(with_threshold(2))
            .provider(Provider::PrimaryCloud, failing.clone())
            .provider(Provider::SecondaryCloud, fixed("secondary"))
            .build();

        for _ in 0..2 {
            router.route("p", "s", Provider::PrimaryCloud).await.unwrap();
        }
        assert_eq!(router.circuit_snapshot(Provider::PrimaryCloud).state, CircuitState::Open);

        router.route("p", "s", Provider::PrimaryCloud).await.unwrap();
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(60)).await;
        router.route("p", "s", Provider::PrimaryCloud).await.unwrap();
        assert_eq!(failing.calls.load(Ordering::SeqCst), 3);
        assert_eq!(router.circuit_snapshot(Provider::PrimaryCloud).state, CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out_and_fails_over() {
        let slow = FixedProvider::new("slow").with_delay(Duration::from_secs(45));
        let router = BackendRouter::builder()
            .provider(Provider::PrimaryCloud, Arc::new(slow))
            .provider(Provider::SecondaryCloud, fixed("fast"))
            .build();

        let text = router.route("p", "s", Provider::PrimaryCloud).await.unwrap();
        assert_eq!(text, "fast");
        assert_eq!(router.circuit_snapshot(Provider::PrimaryCloud).failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_deadline() {
        let slow = FixedProvider::new("slow").with_delay(Duration::from_secs(20));
        let config = RouterConfig {
            route_deadline: Some(Duration::from_secs(10)),
            ..Default::default()
        };
        let router = BackendRouter::builder()
            .config(config)
            .provider(Provider::PrimaryCloud, Arc::new(slow))
            .build();

        assert_eq!(
            router.route("p", "s", Provider::PrimaryCloud).await,
            Err(RouterError::DeadlineExceeded(Duration::from_secs(10)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_deadline_reaches_last_provider() {
        let hung = || -> Arc<dyn LlmProvider> {
            Arc::new(FixedProvider::new("late").with_delay(Duration::from_secs(600)))
        };
        let router = BackendRouter::builder()
            .provider(Provider::Local, hung())
            .provider(Provider::PrimaryCloud, hung())
            .provider(Provider::SecondaryCloud, hung())
            .provider(
                Provider::TertiaryCloud,
                Arc::new(FixedProvider::new("healthy").with_delay(Duration::from_secs(2))),
            )
            .build();

        assert_eq!(
            router.route("p", "s", Provider::Local).await,
            Ok("healthy".to_string())
        );
        for provider in [Provider::Local, Provider::PrimaryCloud, Provider::SecondaryCloud] {
            assert_eq!(router.circuit_snapshot(provider).failure_count, 1);
        }
    }

    #[tokio::test]
    async fn test_local_availability_is_memoized() {
        let router = BackendRouter::builder()
            .provider(Provider::Local, Arc::new(FixedProvider::default().with_health(false)))
            .build();

        assert!(!router.is_local_available().await);
        assert_eq!(router.state.local_available.load(Ordering::SeqCst), LOCAL_DOWN);

        router.invalidate_local_availability();
        assert_eq!(router.state.local_available.load(Ordering::SeqCst), LOCAL_UNKNOWN);

        let no_local = BackendRouter::builder().build();
        assert!(!no_local.is_local_available().await);
    }

    #[tokio::test]
    async fn test_health_check_ignores_circuits() {
        let router = BackendRouter::builder()
            .config(with_threshold(1))
            .provider(Provider::PrimaryCloud, fixed("ok"))
            .provider(Provider::Local, Arc::new(FailingProvider::default()))
            .build();

        router.state.circuits.record_failure(Provider::PrimaryCloud);
        let health = router.health_check().await;

        assert_eq!(health[&Provider::PrimaryCloud], true);
        assert_eq!(health[&Provider::SecondaryCloud], false);
        assert_eq!(health[&Provider::Local], false);
        assert_eq!(health.len(), 4);
    }

    #[tokio::test]
    async fn test_reset_circuit() {
        let router = BackendRouter::builder()
            .config(with_threshold(1))
            .provider(Provider::PrimaryCloud, Arc::new(FailingProvider::default()))
            .build();

        let _ = router.route("p", "s", Provider::PrimaryCloud).await;
        assert!(router.circuit_snapshot(Provider::PrimaryCloud).is_open());

        router.reset_circuit(Provider::PrimaryCloud);
        assert!(!router.circuit_snapshot(Provider::PrimaryCloud).is_open());
    }

    #[test]
    fn test_from_config_builds_slots() {
        let config = RuntimeConfig::offline();
        let router = BackendRouter::from_config(&config, &ProviderRegistry::with_defaults()).unwrap();

        assert!(router.has_provider(Provider::TertiaryCloud));
        assert_eq!(router.backend_name(Provider::Local), Some("fixed"));
    }

    #[test]
    fn test_from_config_reports_bad_slot() {
        let mut config = RuntimeConfig::default();
        config.providers.insert(
            Provider::SecondaryCloud,
            crate::config::ProviderSlotConfig::new("gemini"),
        );

        let err = BackendRouter::from_config(&config, &ProviderRegistry::with_defaults()).unwrap_err();
        assert!(err.to_string().contains("secondary_cloud"));
    }
}
