use crate::traits::{ChatMessage, EventStream, Provider, StreamEvent};
use anyhow::Context;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            model: crate::config::DEFAULT_OPENAI_MODEL.to_string(),
            base_url: crate::config::DEFAULT_OPENAI_ENDPOINT.to_string(),
            temperature: 0.0,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url = base_url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    async fn post(&self, messages: &[ChatMessage], stream: bool) -> anyhow::Result<reqwest::Response> {
        let request = OpenAIRequest {
            model: &self.model,
            messages,
            stream,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error {}: {}", status, error_text);
        }

        Ok(response)
    }

    fn parse_sse_line(line: &str) -> Option<anyhow::Result<StreamEvent>> {
        let data = line.trim().strip_prefix("data:")?.trim();

        if data == "[DONE]" {
            return Some(Ok(StreamEvent::done("")));
        }

        let response = match serde_json::from_str::<StreamResponse>(data) {
            Ok(response) => response,
            Err(e) => return Some(Err(anyhow::anyhow!("Malformed OpenAI stream chunk: {e}"))),
        };

        let choice = response.choices.into_iter().next()?;
        Some(Ok(StreamEvent {
            delta: choice.delta.content.unwrap_or_default(),
            done: choice.finish_reason.is_some(),
        }))
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<ChatMessage> {
        let response: OpenAIResponse = self.post(messages, false).await?.json().await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| anyhow::anyhow!("No choices in response"))
    }

    async fn complete_stream(&self, messages: &[ChatMessage]) -> anyhow::Result<EventStream> {
        let response = self.post(messages, true).await?;
        let (tx, rx) = tokio::sync::mpsc::channel::<anyhow::Result<StreamEvent>>(256);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(anyhow::anyhow!("OpenAI stream interrupted: {e}"))).await;
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);

                    if let Some(event) = Self::parse_sse_line(&line) {
                        let finished = matches!(&event, Ok(e) if e.done) || event.is_err();
                        if tx.send(event).await.is_err() || finished {
                            return;
                        }
                    }
                }
            }

            let _ = tx.send(Ok(StreamEvent::done(""))).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
