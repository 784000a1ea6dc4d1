//! Scoring backends.
//!
//! This module defines the provider slots the router fails over between,
//! the trait every backend implements, and the concrete backends:
//! Anthropic, OpenAI-compatible, Ollama and a fixed-response provider.
//!
//! ## Security
//!
//! Remote providers load keys through [`secrets::ApiCredential`], which
//! never prints its value.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

mod factory;
mod fixed;
pub mod secrets;

#[cfg(feature = "anthropic")]
mod anthropic;
#[cfg(feature = "local")]
mod ollama;
#[cfg(feature = "openai")]
mod openai;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use fixed::{FixedProvider, FixedProviderFactory};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, AnthropicProviderFactory};
#[cfg(feature = "local")]
pub use ollama::{OllamaProvider, OllamaProviderFactory};
#[cfg(feature = "openai")]
pub use openai::{OpenAiProvider, OpenAiProviderFactory};

/// The four provider slots, fixed at compile time.
///
/// Which backend fills a slot is configuration; the failover order is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    PrimaryCloud,
    SecondaryCloud,
    TertiaryCloud,
    Local,
}

/// Failover order tried after the preferred provider.
pub const FALLBACK_CHAIN: [Provider; 4] = [
    Provider::PrimaryCloud,
    Provider::SecondaryCloud,
    Provider::TertiaryCloud,
    Provider::Local,
];

impl Provider {
    /// Slot name as used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::PrimaryCloud => "primary_cloud",
            Provider::SecondaryCloud => "secondary_cloud",
            Provider::TertiaryCloud => "tertiary_cloud",
            Provider::Local => "local",
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Provider::Local)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from a single provider call.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Settings for one completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model override; providers use their configured model when unset
    pub model: Option<String>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature (0.0 for deterministic)
    pub temperature: f32,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 500,
            temperature: 0.0,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Message role in a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A chat message for completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Split off the system prompt; APIs that take it separately use this.
#[cfg_attr(not(any(feature = "anthropic", feature = "local")), allow(dead_code))]
pub(crate) fn split_system(messages: Vec<ChatMessage>) -> (Option<String>, Vec<ChatMessage>) {
    let mut system: Option<String> = None;
    let mut others = Vec::new();

    for msg in messages {
        match msg.role {
            MessageRole::System => match system.as_mut() {
                Some(existing) => {
                    existing.push_str("\n\n");
                    existing.push_str(&msg.content);
                }
                None => system = Some(msg.content),
            },
            _ => others.push(msg),
        }
    }

    (system, others)
}

/// Response from a completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,

    pub usage: TokenUsage,

    /// Model that produced the response
    pub model: String,

    pub stop_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A scoring backend.
///
/// The router only distinguishes success from failure; every error is
/// recorded against the provider's circuit.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Remote providers: credentials are present. Local providers: the
    /// server answers.
    async fn health_check(&self) -> bool;

    /// Backend name for logs and status output.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_chain_order() {
        assert_eq!(
            FALLBACK_CHAIN,
            [
                Provider::PrimaryCloud,
                Provider::SecondaryCloud,
                Provider::TertiaryCloud,
                Provider::Local
            ]
        );
    }

    #[test]
    fn test_provider_serializes_as_slot_name() {
        let json = serde_json::to_string(&Provider::SecondaryCloud).unwrap();
        assert_eq!(json, "\"secondary_cloud\"");
        assert_eq!(Provider::Local.to_string(), "local");
    }

    #[test]
    fn test_split_system_merges_system_messages() {
        let (system, rest) = split_system(vec![
            ChatMessage::system("first"),
            ChatMessage::user("question"),
            ChatMessage::system("second"),
        ]);
        assert_eq!(system.as_deref(), Some("first\n\nsecond"));
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].role, MessageRole::User);
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }
}
