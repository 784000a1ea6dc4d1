//! Ollama provider for the local slot.

use super::{
    factory::ProviderFactory, split_system, ChatMessage, CompletionConfig, CompletionResponse,
    LlmProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

const DEFAULT_HOST: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3";

/// Local model served by Ollama.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    host: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(host: &str, model: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        OllamaProviderFactory.validate_config(config)?;
        Self::new(
            config["host"].as_str().unwrap_or(DEFAULT_HOST),
            config["model"].as_str().unwrap_or(DEFAULT_MODEL),
        )
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// `/api/generate` takes a single prompt; the system prompt leads it.
fn flatten_prompt(messages: Vec<ChatMessage>) -> String {
    let (system, turns) = split_system(messages);
    let body = turns
        .into_iter()
        .map(|m| m.content)
        .collect::<Vec<_>>()
        .join("\n\n");

    match system {
        Some(system) => format!("{}\n\n{}", system, body),
        None => body,
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = GenerateRequest {
            model: config.model.clone().unwrap_or_else(|| self.model.clone()),
            prompt: flatten_prompt(messages),
            stream: false,
            options: GenerateOptions {
                temperature: config.temperature,
                num_predict: config.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.host))
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(CompletionResponse {
            content: body.response,
            usage: TokenUsage {
                prompt_tokens: body.prompt_eval_count.unwrap_or(0),
                completion_tokens: body.eval_count.unwrap_or(0),
            },
            model: body.model.unwrap_or_else(|| self.model.clone()),
            stop_reason: body.done_reason,
        })
    }

    /// Reachability: `/api/tags` answers 200. The caller bounds the wait.
    async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/tags", self.host))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(host = %self.host, error = %e, "Ollama not reachable");
                false
            }
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Factory for Ollama providers.
///
/// ## Configuration Format
/// ```json
/// {
///   "host": "http://localhost:11434",  // Optional
///   "model": "llama3"                  // Optional
/// }
/// ```
pub struct OllamaProviderFactory;

impl ProviderFactory for OllamaProviderFactory {
    fn provider_type(&self) -> &'static str {
        "ollama"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(OllamaProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if let Some(host) = config["host"].as_str() {
            if !host.starts_with("http://") && !host.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "host must start with http:// or https://".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "host": DEFAULT_HOST,
            "model": DEFAULT_MODEL
        })
    }

    fn description(&self) -> &'static str {
        "Local models served by Ollama"
    }
}
