//! Chat inference backend.
//!
//! A [`LanguageBackend`] turns a model name into a bound [`ChatModel`]
//! handle; the pipeline holds at most one handle and swaps it atomically
//! on model switches. [`OllamaBackend`] talks to a local Ollama server:
//!
//! ```text
//! POST {url}/api/chat
//! {"model": "mistral:latest", "messages": [...], "stream": false}
//! → {"message": {"role": "assistant", "content": "..."}, "done": true}
//! ```
//!
//! Server errors (5xx) and connection failures are retried with
//! exponential backoff; 4xx responses (e.g. unknown model) fail at once.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{RagError, Result};
use crate::models::ChatMessage;

/// A model handle ready to answer.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    /// Run one non-streaming completion and return the assistant text.
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Factory for model handles.
pub trait LanguageBackend: Send + Sync {
    /// Bind a handle for `name`. Does not check that the model is
    /// installed; that is the registry's job.
    fn bind(&self, name: &str) -> Result<Box<dyn ChatModel>>;
}

#[derive(Debug, Clone)]
pub struct OllamaBackend {
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client,
        })
    }
}

impl LanguageBackend for OllamaBackend {
    fn bind(&self, name: &str) -> Result<Box<dyn ChatModel>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RagError::Configuration("model name must not be empty".to_string()));
        }
        Ok(Box::new(OllamaChat {
            model: name.to_string(),
            url: self.url.clone(),
            max_retries: self.max_retries,
            client: self.client.clone(),
        }))
    }
}

/// Handle bound to one Ollama model.
#[derive(Debug)]
pub struct OllamaChat {
    model: String,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn name(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/chat", self.url))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let payload: Value = response
                            .json()
                            .await
                            .map_err(|e| RagError::Inference(e.to_string()))?;
                        return parse_chat_response(&payload);
                    }

                    let text = response.text().await.unwrap_or_default();
                    let err = RagError::Inference(format!(
                        "Ollama chat error {} for model '{}': {}",
                        status, self.model, text
                    ));
                    if status.is_server_error() {
                        tracing::warn!(attempt, %status, model = %self.model, "ollama chat failed, retrying");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "ollama chat connection failed");
                    last_err = Some(RagError::Inference(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url, e
                    )));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| RagError::Inference("Ollama chat failed after retries".to_string())))
    }
}

fn parse_chat_response(payload: &Value) -> Result<String> {
    if let Some(err) = payload.get("error").and_then(|e| e.as_str()) {
        return Err(RagError::Inference(err.to_string()));
    }
    payload["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            RagError::Inference("Invalid Ollama response: missing message.content".to_string())
        })
}
