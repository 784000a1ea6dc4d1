//! Runtime configuration.
//!
//! Loaded from YAML at startup. Durations are written the human way
//! (`"60s"`, `"2m"`); every field has a default so an empty file is valid.
//!
//! ```yaml
//! router:
//!   circuit:
//!     failure_threshold: 3
//!     recovery_timeout: 60s
//!   route_deadline: 4m
//! providers:
//!   primary_cloud:
//!     type: openai
//!     api_key_env: GEMINI_API_KEY
//!     base_url: https://generativelanguage.googleapis.com/v1beta/openai
//!     model: gemini-2.0-flash
//!   local:
//!     type: ollama
//!     model: llama3
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::{CompletionConfig, Provider, ProviderError, FALLBACK_CHAIN};
use crate::resilience::CircuitBreakerConfig;

/// Errors loading runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Provider slot '{slot}' is misconfigured: {source}")]
    Provider {
        slot: Provider,
        #[source]
        source: ProviderError,
    },
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub router: RouterConfig,

    /// Backend per provider slot. Empty slots are skipped by the router.
    pub providers: BTreeMap<Provider, ProviderSlotConfig>,

    pub completion: CompletionSettings,

    pub cache: CacheConfig,

    pub engine: EngineConfig,

    /// Grading policy file; the built-in policy is used when unset.
    pub policy_path: Option<PathBuf>,
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Fill every slot with a fixed-response backend. Used for offline runs.
    pub fn offline() -> Self {
        let mut config = Self::default();
        for provider in crate::providers::FALLBACK_CHAIN {
            config.providers.insert(provider, ProviderSlotConfig::fixed());
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.router.circuit.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "router.circuit.failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.router.probe_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "router.probe_timeout must be greater than zero".to_string(),
            ));
        }
        if self.engine.batch_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "engine.batch_concurrency must be at least 1".to_string(),
            ));
        }
        if let Some(gap) = self.router.deadline_shortfall() {
            tracing::warn!(
                deadline = ?self.router.route_deadline,
                full_chain = ?self.router.full_chain_timeout(),
                shortfall = ?gap,
                "router.route_deadline is shorter than the full fallback chain; late providers may never be tried"
            );
        }
        if let Some(slot) = self
            .providers
            .iter()
            .find(|(_, slot)| slot.provider_type.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "providers.{}.type must not be empty",
                slot.0
            )));
        }
        Ok(())
    }
}

/// Router timeouts and circuit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub circuit: CircuitBreakerConfig,

    #[serde(with = "duration_human")]
    pub remote_call_timeout: Duration,

    #[serde(with = "duration_human")]
    pub local_call_timeout: Duration,

    /// Bound on a local reachability probe.
    #[serde(with = "duration_human")]
    pub probe_timeout: Duration,

    /// Bound on one whole preferred-then-fallback pass. `None` disables it.
    #[serde(with = "option_duration_human")]
    pub route_deadline: Option<Duration>,
}

/// Slack added on top of the full fallback chain for the default deadline.
pub const ROUTE_DEADLINE_MARGIN: Duration = Duration::from_secs(30);

impl Default for RouterConfig {
    fn default() -> Self {
        let mut config = Self {
            circuit: CircuitBreakerConfig::default(),
            remote_call_timeout: Duration::from_secs(30),
            local_call_timeout: Duration::from_secs(120),
            probe_timeout: Duration::from_secs(5),
            route_deadline: None,
        };
        config.route_deadline = Some(config.full_chain_timeout() + ROUTE_DEADLINE_MARGIN);
        config
    }
}

impl RouterConfig {
    /// Worst case for one pass over every slot: the local call plus each
    /// remote call timing out.
    pub fn full_chain_timeout(&self) -> Duration {
        let remote_slots = FALLBACK_CHAIN.iter().filter(|p| !p.is_local()).count() as u32;
        self.local_call_timeout + self.remote_call_timeout * remote_slots
    }

    /// How far the route deadline falls short of the full chain, if it does.
    /// A short deadline can end routing before the last providers are tried.
    pub fn deadline_shortfall(&self) -> Option<Duration> {
        let deadline = self.route_deadline?;
        self.full_chain_timeout()
            .checked_sub(deadline)
            .filter(|gap| !gap.is_zero())
    }

    pub fn call_timeout(&self, provider: Provider) -> Duration {
        if provider.is_local() {
            self.local_call_timeout
        } else {
            self.remote_call_timeout
        }
    }
}

/// One provider slot: a registry type name plus that type's settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSlotConfig {
    #[serde(rename = "type")]
    pub provider_type: String,

    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl ProviderSlotConfig {
    pub fn new(provider_type: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            settings: serde_json::Map::new(),
        }
    }

    pub fn fixed() -> Self {
        Self::new("fixed")
    }

    pub fn with_setting(mut self, key: &str, value: serde_json::Value) -> Self {
        self.settings.insert(key.to_string(), value);
        self
    }

    /// Settings as the JSON object factories expect.
    pub fn settings_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.settings.clone())
    }
}

/// Generation settings shared by every routed call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.0,
        }
    }
}

impl CompletionSettings {
    pub fn to_completion_config(&self, timeout: Duration) -> CompletionConfig {
        CompletionConfig {
            model: None,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout,
        }
    }
}

/// Vote cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,
    #[serde(with = "duration_human")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Engine-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Councils running at once during a batch.
    pub batch_concurrency: usize,

    /// Profile used when a request names none.
    pub default_profile: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_concurrency: 4,
            default_profile: None,
        }
    }
}

pub(crate) mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod option_duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => humantime::parse_duration(&text)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.router.circuit.failure_threshold, 3);
        assert_eq!(config.router.circuit.recovery_timeout, Duration::from_secs(60));
        assert!(config.router.circuit.auto_recovery);
        assert_eq!(config.router.call_timeout(Provider::Local), Duration::from_secs(120));
        assert_eq!(
            config.router.call_timeout(Provider::PrimaryCloud),
            Duration::from_secs(30)
        );
        assert_eq!(config.router.full_chain_timeout(), Duration::from_secs(210));
        assert_eq!(config.router.route_deadline, Some(Duration::from_secs(240)));
        assert_eq!(config.router.deadline_shortfall(), None);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = RuntimeConfig::from_yaml("{}").unwrap();
        assert_eq!(config.engine.batch_concurrency, 4);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_human_durations_and_slots() {
        let yaml = r#"
router:
  circuit:
    failure_threshold: 5
    recovery_timeout: 2m
    auto_recovery: false
  remote_call_timeout: 10s
  route_deadline: ~
providers:
  primary_cloud:
    type: openai
    api_key_env: GEMINI_API_KEY
    model: gemini-2.0-flash
  local:
    type: ollama
    host: http://localhost:11434
cache:
  enabled: true
  ttl: 15m
"#;
        let config = RuntimeConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.router.circuit.failure_threshold, 5);
        assert_eq!(config.router.circuit.recovery_timeout, Duration::from_secs(120));
        assert!(!config.router.circuit.auto_recovery);
        assert_eq!(config.router.remote_call_timeout, Duration::from_secs(10));
        assert_eq!(config.router.route_deadline, None);
        assert_eq!(config.cache.ttl, Duration::from_secs(900));

        let primary = &config.providers[&Provider::PrimaryCloud];
        assert_eq!(primary.provider_type, "openai");
        assert_eq!(primary.settings_json()["api_key_env"], "GEMINI_API_KEY");
        assert_eq!(config.providers[&Provider::Local].provider_type, "ollama");
    }

    #[test]
    fn test_bundled_sample_config_parses() {
        let config = RuntimeConfig::from_yaml(include_str!("../../../config/tribunal.yaml")).unwrap();

        assert_eq!(config.providers.len(), 4);
        assert_eq!(config.router.route_deadline, Some(Duration::from_secs(240)));
        assert_eq!(config.cache.ttl, Duration::from_secs(3600));
        assert_eq!(config.providers[&Provider::TertiaryCloud].provider_type, "openai");
    }

    #[test]
    fn test_short_deadline_reports_shortfall() {
        let yaml = "router:\n  local_call_timeout: 2m\n  remote_call_timeout: 30s\n  route_deadline: 3m\n";
        let config = RuntimeConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.router.deadline_shortfall(), Some(Duration::from_secs(30)));

        let unbounded = RouterConfig {
            route_deadline: None,
            ..Default::default()
        };
        assert_eq!(unbounded.deadline_shortfall(), None);
    }

    #[test]
    fn test_bad_duration_rejected() {
        let yaml = "router:\n  probe_timeout: soon\n";
        assert!(matches!(
            RuntimeConfig::from_yaml(yaml),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let yaml = "router:\n  circuit:\n    failure_threshold: 0\n";
        assert!(matches!(
            RuntimeConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(msg)) if msg.contains("failure_threshold")
        ));
    }

    #[test]
    fn test_offline_fills_every_slot() {
        let config = RuntimeConfig::offline();
        assert_eq!(config.providers.len(), 4);
        assert!(config.providers.values().all(|s| s.provider_type == "fixed"));
    }

    #[test]
    fn test_round_trip_keeps_human_durations() {
        let yaml = serde_yaml::to_string(&RuntimeConfig::default()).unwrap();
        assert!(yaml.contains("recovery_timeout: 1m"));
    }
}
