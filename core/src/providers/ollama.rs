use crate::traits::{ChatMessage, EventStream, Provider, StreamEvent};
use anyhow::Context;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ShowModelRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct PullModelRequest<'a> {
    name: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct PullModelResponse {
    #[serde(default)]
    status: String,
}

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: crate::config::DEFAULT_OLLAMA_ENDPOINT.to_string(),
            model: crate::config::DEFAULT_OLLAMA_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url = base_url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> anyhow::Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach Ollama at {}", self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error ({}): {}", status, error_text);
        }

        Ok(response)
    }

    fn parse_stream_line(line: &str) -> Option<anyhow::Result<StreamEvent>> {
        let line = line.trim();

        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<OllamaResponse>(line) {
            Ok(response) => response,
            Err(e) => return Some(Err(anyhow::anyhow!("Malformed Ollama stream line: {e}"))),
        };

        if let Some(error) = response.error {
            return Some(Err(anyhow::anyhow!("Ollama stream error: {error}")));
        }

        let delta = response.message.map(|m| m.content).unwrap_or_default();
        Some(Ok(StreamEvent {
            delta,
            done: response.done,
        }))
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<ChatMessage> {
        let request = OllamaRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response: OllamaResponse = self.post("/api/chat", &request).await?.json().await?;

        if let Some(error) = response.error {
            anyhow::bail!("Ollama API error: {error}");
        }

        response
            .message
            .ok_or_else(|| anyhow::anyhow!("Ollama response has no message"))
    }

    async fn complete_stream(&self, messages: &[ChatMessage]) -> anyhow::Result<EventStream> {
        let request = OllamaRequest {
            model: &self.model,
            messages,
            stream: true,
        };

        let response = self.post("/api/chat", &request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel::<anyhow::Result<StreamEvent>>(256);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(anyhow::anyhow!("Ollama stream interrupted: {e}"))).await;
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);

                    if let Some(event) = Self::parse_stream_line(&line) {
                        let finished = matches!(&event, Ok(e) if e.done) || event.is_err();
                        if tx.send(event).await.is_err() || finished {
                            return;
                        }
                    }
                }
            }

            let tail = String::from_utf8_lossy(&buffer).to_string();
            if let Some(event) = Self::parse_stream_line(&tail) {
                let _ = tx.send(event).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn show_model(&self, name: &str) -> anyhow::Result<()> {
        self.post("/api/show", &ShowModelRequest { name })
            .await
            .with_context(|| format!("Model '{name}' is not available"))?;
        Ok(())
    }

    async fn pull_model(&self, name: &str) -> anyhow::Result<()> {
        tracing::info!("Pulling model {}", name);
        let response: PullModelResponse = self
            .post("/api/pull", &PullModelRequest { name, stream: false })
            .await?
            .json()
            .await?;
        tracing::debug!("Pull of {} finished with status '{}'", name, response.status);
        Ok(())
    }
}
