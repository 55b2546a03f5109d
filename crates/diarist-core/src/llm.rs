use std::future::Future;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{DiaristError, Result};

/// The text-generation backend the session controller calls once per close.
///
/// Uses return-position `impl Future` like [`crate::storage::SessionStore`],
/// so implementors are plain structs with `async fn` bodies.
pub trait TextGenerator: Send + Sync {
    /// Send one prompt and return the model's raw reply.
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;

    /// Lightweight liveness probe. Never errors; unreachable means `false`.
    fn is_available(&self) -> impl Future<Output = bool> + Send;
}

impl<M: TextGenerator> TextGenerator for std::sync::Arc<M> {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.as_ref().generate(prompt).await
    }

    async fn is_available(&self) -> bool {
        self.as_ref().is_available().await
    }
}

/// LLM text generation over HTTP. Ollama is the default backend; any
/// OpenAI-compatible chat endpoint works too.
pub struct LlmService {
    provider: LlmProvider,
    config: LlmConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for LlmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmService")
            .field("provider", &self.provider)
            .field("model", &self.config.model)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LlmProvider {
    Ollama,
    OpenAI,
}

impl LlmService {
    /// Create an LLM service from configuration.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let provider = match config.provider.as_str() {
            "ollama" => LlmProvider::Ollama,
            "openai" => LlmProvider::OpenAI,
            other => {
                return Err(DiaristError::Config(format!(
                    "unknown LLM provider: '{other}' (expected 'ollama' or 'openai')"
                )));
            }
        };

        if provider == LlmProvider::OpenAI {
            resolve_api_key(config, "OPENAI_API_KEY")?;
        }

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| DiaristError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            provider,
            config: config.clone(),
            client,
        })
    }

    pub fn provider_name(&self) -> &'static str {
        match self.provider {
            LlmProvider::Ollama => "ollama",
            LlmProvider::OpenAI => "openai",
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Base URL with the provider default applied and no trailing slash.
    pub fn base_url(&self) -> String {
        let default = match self.provider {
            LlmProvider::Ollama => "http://localhost:11434",
            LlmProvider::OpenAI => "https://api.openai.com",
        };
        self.config
            .base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    /// Ollama: POST {base_url}/api/generate
    async fn generate_ollama(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url());

        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "num_predict": self.config.max_tokens,
            }
        });

        tracing::info!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "calling Ollama"
        );

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                DiaristError::ServiceUnavailable(format!("Ollama request failed: {e}"))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(DiaristError::Service(format!("Ollama error {status}: {text}")));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| DiaristError::Service(format!("Ollama response parse error: {e}")))?;

        let reply = json["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| DiaristError::Service("Ollama response missing 'response' field".into()))?;

        tracing::info!(reply_len = reply.len(), "Ollama call succeeded");
        Ok(reply)
    }

    /// OpenAI-compatible: POST {base_url}/v1/chat/completions
    async fn generate_openai(&self, prompt: &str) -> Result<String> {
        let api_key = resolve_api_key(&self.config, "OPENAI_API_KEY")?;
        let url = format!("{}/v1/chat/completions", self.base_url());

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": self.config.max_tokens,
        });

        tracing::info!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "calling OpenAI-compatible endpoint"
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                DiaristError::ServiceUnavailable(format!("OpenAI request failed: {e}"))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(DiaristError::Service(format!("OpenAI error {status}: {text}")));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| DiaristError::Service(format!("OpenAI response parse error: {e}")))?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| DiaristError::Service("OpenAI response missing content".into()))
    }

    fn health_url(&self) -> String {
        match self.provider {
            LlmProvider::Ollama => format!("{}/api/tags", self.base_url()),
            LlmProvider::OpenAI => format!("{}/v1/models", self.base_url()),
        }
    }
}

impl TextGenerator for LlmService {
    async fn generate(&self, prompt: &str) -> Result<String> {
        match self.provider {
            LlmProvider::Ollama => self.generate_ollama(prompt).await,
            LlmProvider::OpenAI => self.generate_openai(prompt).await,
        }
    }

    async fn is_available(&self) -> bool {
        let mut request = self.client.get(self.health_url());
        if self.provider == LlmProvider::OpenAI {
            if let Ok(key) = resolve_api_key(&self.config, "OPENAI_API_KEY") {
                request = request.header("Authorization", format!("Bearer {key}"));
            }
        }

        match request.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!("LLM service unavailable: {e}");
                false
            }
        }
    }
}

/// Resolve an API key from config, a custom env var, or a default env var.
fn resolve_api_key(config: &LlmConfig, default_env_var: &str) -> Result<String> {
    if let Some(ref key) = config.api_key {
        if !key.is_empty() {
            return Ok(key.clone());
        }
    }

    let env_var_name = config.env_var.as_deref().unwrap_or(default_env_var);

    std::env::var(env_var_name).map_err(|_| {
        DiaristError::Config(format!(
            "{} LLM provider requires an API key (set llm.api_key or {})",
            config.provider, env_var_name
        ))
    })
}
