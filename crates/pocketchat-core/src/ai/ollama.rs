use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::pipeline::{GenerationOptions, PipelineLoader, TextGenerationPipeline};
use crate::state::ModelMessage;
use crate::status::DownloadProgress;

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ModelMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    num_predict: u32,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct PullStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    completed: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stream a chat completion, calling `on_token` for every content
    /// fragment.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[ModelMessage],
        options: &GenerationOptions,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<()> {
        let url = format!("{}/api/chat", self.base_url);

        let request = ChatRequest {
            model,
            messages,
            stream: true,
            options: ChatOptions {
                num_predict: options.max_new_tokens,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Ollama request failed with status: {}. Make sure Ollama is running with: ollama serve",
                response.status()
            ));
        }

        for_each_json_line(response, |chunk: ChatChunk| {
            if let Some(err) = chunk.error {
                return Err(anyhow!("Ollama error: {}", err));
            }
            if let Some(message) = chunk.message {
                if !message.content.is_empty() {
                    on_token(message.content);
                }
            }
            Ok(!chunk.done)
        })
        .await
    }

    /// Pull `model`, reporting per-layer download progress.
    pub async fn pull(
        &self,
        model: &str,
        on_progress: &mut (dyn FnMut(DownloadProgress) + Send),
    ) -> Result<()> {
        let url = format!("{}/api/pull", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&PullRequest { model, stream: true })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to pull model {}: {}", model, response.status()));
        }

        for_each_json_line(response, |status: PullStatus| {
            if let Some(err) = &status.error {
                return Err(anyhow!("Failed to pull model {}: {}", model, err));
            }
            on_progress(pull_progress(&status));
            Ok(status.status != "success")
        })
        .await
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to list models: {}", response.status()));
        }

        let models_response: OllamaModelsResponse = response.json().await?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect();

        Ok(model_names)
    }

    pub async fn has_model(&self, name: &str) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| model_matches(m, name)))
    }
}

/// Ollama reports `name` without a tag as `name:latest`.
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted || (!wanted.contains(':') && installed == format!("{}:latest", wanted))
}

fn pull_progress(status: &PullStatus) -> DownloadProgress {
    let file = status.digest.clone().unwrap_or_else(|| status.status.clone());
    match (status.completed, status.total) {
        (Some(completed), Some(total)) => DownloadProgress::from_bytes(completed, total, file),
        _ if status.status == "success" => DownloadProgress::new(100.0, file),
        _ => DownloadProgress::new(0.0, file),
    }
}

/// Read a newline-delimited JSON body, handing each object to `f` until it
/// returns `Ok(false)` or the body ends.
async fn for_each_json_line<T, F>(response: Response, mut f: F) -> Result<()>
where
    T: DeserializeOwned,
    F: FnMut(T) -> Result<bool>,
{
    let mut stream = response.bytes_stream();
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buf.drain(..=pos).collect();
            let line = line.trim_ascii();
            if line.is_empty() {
                continue;
            }
            if !f(serde_json::from_slice(line)?)? {
                return Ok(());
            }
        }
    }

    let tail = buf.trim_ascii();
    if !tail.is_empty() {
        f(serde_json::from_slice(tail)?)?;
    }
    Ok(())
}

/// Loads an Ollama model, pulling it first when it isn't installed.
pub struct OllamaLoader {
    client: OllamaClient,
    model: String,
}

impl OllamaLoader {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl PipelineLoader for OllamaLoader {
    async fn load(
        &self,
        on_progress: &mut (dyn FnMut(DownloadProgress) + Send),
    ) -> Result<Arc<dyn TextGenerationPipeline>> {
        if self.client.has_model(&self.model).await? {
            tracing::debug!(model = %self.model, "model already installed");
        } else {
            tracing::info!(model = %self.model, host = %self.client.base_url(), "pulling model");
            self.client.pull(&self.model, on_progress).await?;
        }

        Ok(Arc::new(OllamaPipeline {
            client: self.client.clone(),
            model: self.model.clone(),
        }))
    }
}

pub struct OllamaPipeline {
    client: OllamaClient,
    model: String,
}

#[async_trait]
impl TextGenerationPipeline for OllamaPipeline {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        messages: &[ModelMessage],
        options: &GenerationOptions,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<()> {
        self.client
            .chat_stream(&self.model, messages, options, on_token)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_matches_latest_tag() {
        assert!(model_matches("qwen3:0.6b", "qwen3:0.6b"));
        assert!(model_matches("llama3.2:latest", "llama3.2"));
        assert!(!model_matches("llama3.2:1b", "llama3.2"));
        assert!(!model_matches("qwen3:latest", "qwen3:0.6b"));
    }

    #[test]
    fn test_pull_progress_from_layer_status() {
        let status: PullStatus = serde_json::from_str(
            r#"{"status":"pulling 8eeb52dfb3bb","digest":"sha256:8eeb","total":400,"completed":100}"#,
        )
        .unwrap();
        let progress = pull_progress(&status);
        assert_eq!(progress.file, "sha256:8eeb");
        assert_eq!(progress.progress, 25.0);
    }

    #[test]
    fn test_pull_progress_without_counts() {
        let status: PullStatus = serde_json::from_str(r#"{"status":"verifying sha256 digest"}"#).unwrap();
        assert_eq!(pull_progress(&status), DownloadProgress::new(0.0, "verifying sha256 digest"));

        let done: PullStatus = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert_eq!(pull_progress(&done).progress, 100.0);
    }

    #[test]
    fn test_chat_chunk_parses() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{"model":"qwen3","message":{"role":"assistant","content":"<think>"},"done":false}"#,
        )
        .unwrap();
        assert_eq!(chunk.message.unwrap().content, "<think>");
        assert!(!chunk.done);

        let last: ChatChunk = serde_json::from_str(r#"{"model":"qwen3","done":true,"eval_count":12}"#).unwrap();
        assert!(last.done);
        assert!(last.message.is_none());
    }

    #[test]
    fn test_chat_request_body() {
        let messages = vec![ModelMessage::system("s"), ModelMessage::user("hi")];
        let body = serde_json::to_value(ChatRequest {
            model: "qwen3:0.6b",
            messages: &messages,
            stream: true,
            options: ChatOptions { num_predict: 512 },
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "qwen3:0.6b",
                "messages": [
                    {"role": "system", "content": "s"},
                    {"role": "user", "content": "hi"}
                ],
                "stream": true,
                "options": {"num_predict": 512}
            })
        );
    }
}
