//! Blocking client for OpenAI-compatible `/chat/completions` endpoints.
//!
//! Works against the OpenAI API and any server speaking the same protocol
//! (Ollama's `/v1`, vLLM, llama.cpp server, ...).

use serde::{Deserialize, Serialize};

use super::{ChatMessage, LanguageModel, LmError, LmResult};

/// Configuration for [`OpenAiClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Base URL, without the `/chat/completions` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name sent with every request.
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the bearer key. Empty disables auth.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: f64,
    /// Sampling seed, for endpoints that honour it.
    #[serde(default = "default_seed")]
    pub seed: Option<u64>,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4o".into()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_seed() -> Option<u64> {
    Some(7 * 17 * 14717)
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: 0.0,
            seed: default_seed(),
        }
    }
}

/// OpenAI-compatible chat client over `ureq`.
pub struct OpenAiClient {
    config: OpenAiConfig,
    agent: ureq::Agent,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build();
        Self { config, agent }
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn api_key(&self) -> LmResult<Option<String>> {
        if self.config.api_key_env.is_empty() {
            return Ok(None);
        }
        std::env::var(&self.config.api_key_env)
            .map(Some)
            .map_err(|_| LmError::MissingApiKey {
                var: self.config.api_key_env.clone(),
            })
    }

    fn request_body(&self, messages: &[ChatMessage], json_format: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
        });
        if let Some(seed) = self.config.seed {
            body["seed"] = serde_json::json!(seed);
        }
        if json_format {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }
}

impl LanguageModel for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn chat(&self, messages: &[ChatMessage], json_format: bool) -> LmResult<String> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body_str = serde_json::to_string(&self.request_body(messages, json_format))
            .map_err(|e| LmError::RequestFailed {
                message: format!("JSON serialize error: {e}"),
            })?;

        tracing::debug!(model = %self.config.model, messages = messages.len(), json_format, "LM request");

        let mut request = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json");
        if let Some(key) = &api_key {
            request = request.set("Authorization", &format!("Bearer {key}"));
        }

        let resp = match request.send_string(&body_str) {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                return Err(LmError::HttpStatus { status, body });
            }
            Err(e) => {
                return Err(LmError::RequestFailed {
                    message: e.to_string(),
                });
            }
        };

        let resp_str = resp.into_string().map_err(|e| LmError::ParseError {
            message: e.to_string(),
        })?;

        let json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| LmError::ParseError {
                message: e.to_string(),
            })?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| LmError::ParseError {
                message: "missing 'choices[0].message.content' field".into(),
            })
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}
