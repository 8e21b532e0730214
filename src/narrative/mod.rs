//! Narrative generation through hosted language models.
//!
//! Backends are tried in configured order; the first one that answers wins.
//! Each backend gets exactly one attempt per request.

pub mod backends;
pub mod prompt;

pub use backends::{GeminiBackend, OllamaBackend};
pub use prompt::build_prompt;

use crate::config::{BackendKind, NarrativeConfig};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from a text-generation backend.
#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("{backend}: request timed out after {seconds}s")]
    Timeout { backend: String, seconds: u64 },

    #[error("{backend}: cannot connect to {url}")]
    Unreachable { backend: String, url: String },

    #[error("{backend}: request failed: {message}")]
    Transport { backend: String, message: String },

    #[error("{backend}: API error {status}: {body}")]
    Upstream {
        backend: String,
        status: u16,
        body: String,
    },

    #[error("{backend}: unexpected response: {message}")]
    Malformed { backend: String, message: String },

    #[error("{backend}: model returned no text")]
    EmptyReply { backend: String },

    #[error("{backend}: environment variable {var} is not set")]
    MissingApiKey { backend: String, var: String },

    #[error("all narrative backends failed: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

/// A hosted model that turns a prompt into free-form text.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Short identifier used in logs and error messages.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, NarrativeError>;
}

/// Ordered list of backends, each tried once until one succeeds.
#[derive(Clone)]
pub struct BackendChain {
    backends: Vec<Arc<dyn TextBackend>>,
}

impl BackendChain {
    pub fn new(backends: Vec<Arc<dyn TextBackend>>) -> Self {
        Self { backends }
    }

    /// Build the chain described by the `[narrative]` config section.
    pub fn from_config(config: &NarrativeConfig) -> Result<Self, NarrativeError> {
        let mut backends: Vec<Arc<dyn TextBackend>> = Vec::new();

        for backend in &config.backends {
            let built: Arc<dyn TextBackend> = match backend.kind {
                BackendKind::Gemini => Arc::new(GeminiBackend::new(backend, config)?),
                BackendKind::Ollama => Arc::new(OllamaBackend::new(backend, config)?),
            };
            info!("Registered narrative backend {}", built.name());
            backends.push(built);
        }

        Ok(Self::new(backends))
    }

    /// Backend names in the order they are tried.
    pub fn names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Generate text with the first backend that succeeds.
    pub async fn generate(&self, prompt: &str) -> Result<String, NarrativeError> {
        let mut failures = Vec::new();

        for backend in &self.backends {
            debug!("Trying narrative backend {}", backend.name());
            match backend.generate(prompt).await {
                Ok(text) => {
                    if !failures.is_empty() {
                        info!(
                            "Narrative backend {} succeeded after {} failure(s)",
                            backend.name(),
                            failures.len()
                        );
                    }
                    return Ok(text);
                }
                Err(e) => {
                    warn!("Narrative backend failed: {}", e);
                    failures.push(e.to_string());
                }
            }
        }

        Err(NarrativeError::Exhausted(failures))
    }
}
