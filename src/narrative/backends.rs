//! Concrete text-generation backends.
//!
//! - Gemini: Google Generative Language API (`generateContent`)
//! - Ollama: local or self-hosted chat API (`/api/chat`)

use super::{NarrativeError, TextBackend};
use crate::config::{BackendConfig, NarrativeConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

fn build_client(name: &str, timeout_seconds: u64) -> Result<reqwest::Client, NarrativeError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| NarrativeError::Transport {
            backend: name.to_string(),
            message: e.to_string(),
        })
}

fn send_error(name: &str, url: &str, timeout_seconds: u64, e: reqwest::Error) -> NarrativeError {
    if e.is_timeout() {
        NarrativeError::Timeout {
            backend: name.to_string(),
            seconds: timeout_seconds,
        }
    } else if e.is_connect() {
        NarrativeError::Unreachable {
            backend: name.to_string(),
            url: url.to_string(),
        }
    } else {
        NarrativeError::Transport {
            backend: name.to_string(),
            message: e.to_string(),
        }
    }
}

async fn check_status(
    name: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, NarrativeError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(NarrativeError::Upstream {
        backend: name.to_string(),
        status,
        body,
    })
}

// === Gemini ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Google Gemini / Gemma models via the Generative Language API.
pub struct GeminiBackend {
    name: String,
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    temperature: f32,
    timeout_seconds: u64,
}

impl GeminiBackend {
    pub fn new(backend: &BackendConfig, narrative: &NarrativeConfig) -> Result<Self, NarrativeError> {
        let name = format!("gemini/{}", backend.model);
        let api_key_env = backend
            .api_key_env
            .clone()
            .unwrap_or_else(|| "GEMINI_API_KEY".to_string());
        let api_key = std::env::var(&api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            http_client: build_client(&name, narrative.timeout_seconds)?,
            name,
            base_url: backend.base_url().trim_end_matches('/').to_string(),
            model: backend.model.clone(),
            api_key,
            api_key_env,
            temperature: narrative.temperature,
            timeout_seconds: narrative.timeout_seconds,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn extract_text(&self, response: GenerateContentResponse) -> Result<String, NarrativeError> {
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(NarrativeError::EmptyReply {
                backend: self.name.clone(),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl TextBackend for GeminiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String, NarrativeError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| NarrativeError::MissingApiKey {
                backend: self.name.clone(),
                var: self.api_key_env.clone(),
            })?;

        let url = self.endpoint();
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        debug!("Sending prompt to {}", self.name);

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(&self.name, &self.base_url, self.timeout_seconds, e))?;

        let response = check_status(&self.name, response).await?;

        let parsed: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| NarrativeError::Malformed {
                    backend: self.name.clone(),
                    message: e.to_string(),
                })?;

        self.extract_text(parsed)
    }
}

// === Ollama ===

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Models served by an Ollama instance.
pub struct OllamaBackend {
    name: String,
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    timeout_seconds: u64,
}

impl OllamaBackend {
    pub fn new(backend: &BackendConfig, narrative: &NarrativeConfig) -> Result<Self, NarrativeError> {
        let name = format!("ollama/{}", backend.model);

        Ok(Self {
            http_client: build_client(&name, narrative.timeout_seconds)?,
            name,
            base_url: backend.base_url().trim_end_matches('/').to_string(),
            model: backend.model.clone(),
            temperature: narrative.temperature,
            timeout_seconds: narrative.timeout_seconds,
        })
    }
}

#[async_trait]
impl TextBackend for OllamaBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String, NarrativeError> {
        let url = format!("{}/api/chat", self.base_url);

        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        debug!("Sending prompt to {}", self.name);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(&self.name, &self.base_url, self.timeout_seconds, e))?;

        let response = check_status(&self.name, response).await?;

        let chat_response: OllamaChatResponse =
            response
                .json()
                .await
                .map_err(|e| NarrativeError::Malformed {
                    backend: self.name.clone(),
                    message: e.to_string(),
                })?;

        let text = chat_response.message.content;
        if text.trim().is_empty() {
            return Err(NarrativeError::EmptyReply {
                backend: self.name.clone(),
            });
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;

    fn gemini_config() -> BackendConfig {
        BackendConfig {
            kind: BackendKind::Gemini,
            model: "gemma-3-27b-it".to_string(),
            url: None,
            api_key_env: Some("ASTROCHART_TEST_UNSET_KEY".to_string()),
        }
    }

    #[test]
    fn test_gemini_endpoint() {
        let backend = GeminiBackend::new(&gemini_config(), &NarrativeConfig::default()).unwrap();
        assert_eq!(backend.name(), "gemini/gemma-3-27b-it");
        assert_eq!(
            backend.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemma-3-27b-it:generateContent"
        );
    }

    #[test]
    fn test_gemini_request_shape() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some("hi".to_string()),
                }],
            }],
            generation_config: GenerationConfig { temperature: 0.5 },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["generationConfig"]["temperature"], 0.5);
    }

    #[test]
    fn test_gemini_extract_text() {
        let backend = GeminiBackend::new(&gemini_config(), &NarrativeConfig::default()).unwrap();

        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello, "},{"text":"Leo."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(backend.extract_text(parsed).unwrap(), "Hello, Leo.");

        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert!(matches!(
            backend.extract_text(blocked),
            Err(NarrativeError::EmptyReply { .. })
        ));
    }

    #[test]
    fn test_gemini_without_key_fails_fast() {
        let backend = GeminiBackend::new(&gemini_config(), &NarrativeConfig::default()).unwrap();
        let result = tokio_test::block_on(backend.generate("prompt"));
        match result {
            Err(NarrativeError::MissingApiKey { var, .. }) => {
                assert_eq!(var, "ASTROCHART_TEST_UNSET_KEY")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ollama_unreachable() {
        let config = BackendConfig {
            kind: BackendKind::Ollama,
            model: "llama3.2:latest".to_string(),
            url: Some("http://127.0.0.1:1".to_string()),
            api_key_env: None,
        };
        let narrative = NarrativeConfig {
            timeout_seconds: 2,
            ..NarrativeConfig::default()
        };
        let backend = OllamaBackend::new(&config, &narrative).unwrap();
        assert_eq!(backend.name(), "ollama/llama3.2:latest");
        assert!(backend.generate("prompt").await.is_err());
    }
}
