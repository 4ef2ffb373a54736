//! Installed-model discovery.
//!
//! The inference backend is asked which models are installed by running
//! `<command> list` (normally `ollama list`) and reading the first column
//! of its table:
//!
//! ```text
//! NAME               ID              SIZE      MODIFIED
//! mistral:latest     f974a74358d6    4.1 GB    2 days ago
//! llama3.2:latest    a80c4f17acd5    2.0 GB    3 weeks ago
//! ```
//!
//! Discovery never fails: a missing executable, a non-zero exit, or
//! unreadable output all yield an empty list plus a warning in the log.

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::LlmConfig;

/// Source of truth for which models the backend can currently serve.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Installed model names, in the order the backend reports them.
    async fn list_available(&self) -> Vec<String>;

    async fn is_available(&self, name: &str) -> bool {
        self.list_available().await.iter().any(|m| m == name)
    }
}

/// Registry backed by the backend's command-line `list` subcommand.
#[derive(Debug, Clone)]
pub struct OllamaCliRegistry {
    command: String,
}

impl OllamaCliRegistry {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.command.clone())
    }
}

#[async_trait]
impl ModelRegistry for OllamaCliRegistry {
    async fn list_available(&self) -> Vec<String> {
        let output = match Command::new(&self.command).arg("list").output().await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(command = %self.command, error = %e, "failed to run model list command");
                return Vec::new();
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                command = %self.command,
                status = %output.status,
                stderr = %stderr.trim(),
                "model list command failed"
            );
            return Vec::new();
        }

        let models = parse_model_list(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!(count = models.len(), "listed installed models");
        models
    }
}

/// Parse `list` output: skip the header line, then take the first
/// whitespace-delimited token of every non-blank line.
pub fn parse_model_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}
