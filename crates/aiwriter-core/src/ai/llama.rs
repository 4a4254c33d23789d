use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

use super::CompletionEndpoint;
use crate::config::Config;
use crate::error::SessionError;
use crate::protocol::{ChatReply, ChatRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Rough size of one token, used to keep attached files inside the budget.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Serialize)]
struct LlamaMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct LlamaRequest {
    messages: Vec<LlamaMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct LlamaChoice {
    message: LlamaResponseMessage,
}

#[derive(Deserialize)]
struct LlamaResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct LlamaResponse {
    choices: Vec<LlamaChoice>,
}

#[derive(Deserialize)]
struct LlamaModel {
    id: String,
}

#[derive(Deserialize)]
struct LlamaModelsResponse {
    data: Vec<LlamaModel>,
}

/// Client for a llama.cpp server's OpenAI-compatible chat endpoint.
#[derive(Clone)]
pub struct LlamaCppClient {
    client: Client,
    base_url: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
    context_max_tokens: u32,
    timeout: Duration,
}

fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

impl LlamaCppClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: http_client(REQUEST_TIMEOUT),
            base_url: config.endpoint_base().to_string(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            context_max_tokens: config.context_max_tokens,
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Replaces the default 120 second request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn query(&self, request: &ChatRequest) -> std::result::Result<ChatReply, SessionError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut messages = vec![LlamaMessage {
            role: "system",
            content: self.system_prompt.clone(),
        }];
        let context = self.build_context(&request.context_files).await;
        if !context.is_empty() {
            messages.push(LlamaMessage {
                role: "system",
                content: format!("Files in context:\n{}", context),
            });
        }
        messages.push(LlamaMessage {
            role: "user",
            content: request.message.clone(),
        });

        let body = LlamaRequest {
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        info!(%url, files = request.context_files.len(), "sending chat request");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(%status, "llama.cpp returned an error status");
            return Ok(ChatReply::Error {
                error: format!("API error: {}", status.as_u16()),
            });
        }

        let llama_response: LlamaResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                return Ok(ChatReply::Error {
                    error: format!("Malformed response from llama.cpp server: {}", e),
                })
            }
        };
        Ok(match llama_response.choices.into_iter().next() {
            Some(choice) => ChatReply::Response {
                response: choice.message.content,
            },
            None => ChatReply::Error {
                error: "API error: response contained no choices".to_string(),
            },
        })
    }

    /// Model ids served by the endpoint.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1/models", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to list models: {}", response.status()));
        }

        let models_response: LlamaModelsResponse = response.json().await?;
        Ok(models_response.data.into_iter().map(|model| model.id).collect())
    }

    /// `=== name ===` blocks for each readable file, cut off at the budget.
    async fn build_context(&self, files: &[String]) -> String {
        let mut remaining = self.context_max_tokens as usize * CHARS_PER_TOKEN;
        let mut parts: Vec<String> = Vec::new();

        for path in files {
            if remaining == 0 {
                warn!(%path, "context budget exhausted, skipping file");
                continue;
            }
            let content = match tokio::fs::read(path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!(%path, error = %e, "skipping unreadable context file");
                    continue;
                }
            };
            let name = Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone());

            let (content, truncated) = truncate_chars(&content, remaining);
            remaining = remaining.saturating_sub(content.chars().count());
            let mut block = format!("=== {} ===\n{}\n", name, content);
            if truncated {
                debug!(%path, "context file truncated to fit budget");
                block.push_str("[truncated]\n");
            }
            parts.push(block);
        }

        parts.join("\n")
    }

    fn transport_error(&self, e: reqwest::Error) -> SessionError {
        if e.is_connect() {
            SessionError::Network(format!(
                "Cannot connect to llama.cpp server at {}. Is it running? ({})",
                self.base_url, e
            ))
        } else if e.is_timeout() {
            SessionError::Network(format!(
                "llama.cpp server did not answer within {} seconds ({})",
                self.timeout.as_secs_f32(),
                e
            ))
        } else {
            SessionError::Network(format!("Error: {}", e))
        }
    }
}

impl CompletionEndpoint for LlamaCppClient {
    async fn chat(&self, request: ChatRequest) -> std::result::Result<ChatReply, SessionError> {
        self.query(&request).await
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> LlamaCppClient {
        LlamaCppClient::new(&Config {
            llama_cpp_url: server.uri(),
            ..Config::default()
        })
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    #[tokio::test]
    async fn test_query_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "temperature": 0.7,
                "max_tokens": 2000
            })))
            .and(body_string_contains("Tighten this paragraph"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Done.")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .query(&ChatRequest {
                message: "Tighten this paragraph".into(),
                context_files: Vec::new(),
            })
            .await
            .unwrap();
        assert_eq!(
            reply,
            ChatReply::Response {
                response: "Done.".into()
            }
        );
    }

    #[tokio::test]
    async fn test_context_files_are_attached() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.md");
        std::fs::write(&notes, "Ravens gather at dusk.").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("=== notes.md ===\\nRavens gather at dusk."))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .query(&ChatRequest {
                message: "Summarize @notes.md".into(),
                context_files: vec![
                    notes.to_string_lossy().into_owned(),
                    dir.path().join("missing.md").to_string_lossy().into_owned(),
                ],
            })
            .await
            .unwrap();
        assert_eq!(reply.into_result().unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_error_status_is_structured_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .query(&ChatRequest {
                message: "hi".into(),
                context_files: Vec::new(),
            })
            .await
            .unwrap();
        assert_eq!(
            reply,
            ChatReply::Error {
                error: "API error: 503".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let client = LlamaCppClient::new(&Config {
            llama_cpp_url: "http://127.0.0.1:1".into(),
            ..Config::default()
        });
        let err = client
            .query(&ChatRequest {
                message: "hi".into(),
                context_files: Vec::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Network(_)));
    }

    #[tokio::test]
    async fn test_timeout_keeps_transport_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("late"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .with_timeout(Duration::from_millis(50))
            .query(&ChatRequest {
                message: "hi".into(),
                context_files: Vec::new(),
            })
            .await
            .unwrap_err();
        let SessionError::Network(message) = err else {
            panic!("expected a network error, got {err:?}");
        };
        assert!(message.starts_with("llama.cpp server did not answer within"));
        assert!(message.contains("/v1/chat/completions"));
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "data": [{ "id": "mistral-7b-instruct.gguf", "object": "model" }]
            })))
            .mount(&server)
            .await;

        let models = client_for(&server).list_models().await.unwrap();
        assert_eq!(models, vec!["mistral-7b-instruct.gguf"]);
    }

    #[tokio::test]
    async fn test_context_budget_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let long = dir.path().join("long.md");
        std::fs::write(&long, "x".repeat(100)).unwrap();

        let client = LlamaCppClient::new(&Config {
            context_max_tokens: 5,
            ..Config::default()
        });
        let context = client
            .build_context(&[long.to_string_lossy().into_owned()])
            .await;
        assert_eq!(context, format!("=== long.md ===\n{}\n[truncated]\n", "x".repeat(20)));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), ("hé", true));
        assert_eq!(truncate_chars("hé", 5), ("hé", false));
    }
}
