//! Credential handling for remote providers.
//!
//! Keys are wrapped in [`SecretString`] as soon as they are read; `Debug`
//! and `Display` print `[REDACTED]`, and the value is only reachable
//! through [`ApiCredential::expose`] at the point of use.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// The provider's JSON settings
    Config,
    /// An environment variable
    Environment,
    /// Passed in by code
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A provider API key.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load from `config[config_key]`, else from the environment variable
    /// named by `config["api_key_env"]`, else from `default_env`.
    ///
    /// The `api_key_env` indirection lets one provider type serve several
    /// slots with different keys (e.g. an OpenAI-compatible endpoint per
    /// cloud).
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        default_env: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = config[config_key].as_str() {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        let env_var = env_var_name(config, default_env);
        match std::env::var(env_var) {
            Ok(value) => Ok(Self::new(value, CredentialSource::Environment, name)),
            Err(_) => Err(ProviderError::NotConfigured(format!(
                "{} required: set '{}' in config or the {} environment variable",
                name, config_key, env_var
            ))),
        }
    }

    /// Whether [`from_config_or_env`](Self::from_config_or_env) would succeed.
    pub fn is_available(config: &JsonValue, config_key: &str, default_env: &str) -> bool {
        config[config_key].as_str().is_some()
            || std::env::var(env_var_name(config, default_env)).is_ok()
    }

    /// The raw key. Call only where the key is sent.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().trim().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

fn env_var_name<'a>(config: &'a JsonValue, default_env: &'a str) -> &'a str {
    config["api_key_env"].as_str().unwrap_or(default_env)
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}
