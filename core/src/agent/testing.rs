//! Scripted fakes shared by the engine and assistant tests.

use crate::traits::{
    ChatMessage, EventStream, Provider, StreamEvent, Tool, ToolParameter, ToolParameters,
    ToolResult,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub enum Chunk {
    Delta(String),
    Done(String),
    Fail(String),
}

pub fn deltas(parts: &[&str]) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = parts.iter().map(|p| Chunk::Delta(p.to_string())).collect();
    chunks.push(Chunk::Done(String::new()));
    chunks
}

type Responder = Box<dyn Fn(&[ChatMessage]) -> anyhow::Result<String> + Send + Sync>;

pub struct ScriptedProvider {
    streams: Mutex<VecDeque<Vec<Chunk>>>,
    responder: Responder,
    connect_error: Option<String>,
    missing_model: bool,
    complete_delay: Option<Duration>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub stream_calls: Mutex<Vec<Vec<ChatMessage>>>,
    pub complete_calls: Mutex<Vec<Vec<ChatMessage>>>,
    pub pulled: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(VecDeque::new()),
            responder: Box::new(|messages| {
                let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
                Ok(format!("summary: {last}"))
            }),
            connect_error: None,
            missing_model: false,
            complete_delay: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            stream_calls: Mutex::new(Vec::new()),
            complete_calls: Mutex::new(Vec::new()),
            pulled: Mutex::new(Vec::new()),
        }
    }

    pub fn with_stream(self, chunks: Vec<Chunk>) -> Self {
        self.streams.lock().unwrap().push_back(chunks);
        self
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.responder = Box::new(responder);
        self
    }

    pub fn with_connect_error(mut self, message: &str) -> Self {
        self.connect_error = Some(message.to_string());
        self
    }

    pub fn with_missing_model(mut self) -> Self {
        self.missing_model = true;
        self
    }

    /// Makes every `complete` call take at least `delay`.
    pub fn with_complete_delay(mut self, delay: Duration) -> Self {
        self.complete_delay = Some(delay);
        self
    }

    pub fn last_complete_call(&self) -> Vec<ChatMessage> {
        self.complete_calls.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test-model"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<ChatMessage> {
        self.complete_calls.lock().unwrap().push(messages.to_vec());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.complete_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.responder)(messages).map(ChatMessage::assistant)
    }

    async fn complete_stream(&self, messages: &[ChatMessage]) -> anyhow::Result<EventStream> {
        self.stream_calls.lock().unwrap().push(messages.to_vec());
        if let Some(message) = &self.connect_error {
            anyhow::bail!("{message}");
        }

        let chunks = self.streams.lock().unwrap().pop_front().unwrap_or_default();
        let events: Vec<anyhow::Result<StreamEvent>> = chunks
            .into_iter()
            .map(|chunk| match chunk {
                Chunk::Delta(text) => Ok(StreamEvent::delta(text)),
                Chunk::Done(text) => Ok(StreamEvent::done(text)),
                Chunk::Fail(message) => Err(anyhow::anyhow!(message)),
            })
            .collect();
        Ok(futures_util::stream::iter(events).boxed())
    }

    async fn show_model(&self, name: &str) -> anyhow::Result<()> {
        if self.missing_model && self.pulled.lock().unwrap().is_empty() {
            anyhow::bail!("model '{name}' not found");
        }
        Ok(())
    }

    async fn pull_model(&self, name: &str) -> anyhow::Result<()> {
        self.pulled.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

/// A tool that records the query it was given and answers with a fixed
/// result.
pub struct RecordingTool {
    name: String,
    result: Mutex<Option<anyhow::Result<ToolResult>>>,
    pub queries: Mutex<Vec<String>>,
    pub arguments: Mutex<Vec<Map<String, Value>>>,
}

impl RecordingTool {
    pub fn new(name: &str, result: anyhow::Result<ToolResult>) -> Self {
        Self {
            name: name.to_string(),
            result: Mutex::new(Some(result)),
            queries: Mutex::new(Vec::new()),
            arguments: Mutex::new(Vec::new()),
        }
    }

    pub fn last_query(&self) -> Option<String> {
        self.queries.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("{} test tool", self.name)
    }

    fn parameters(&self) -> ToolParameters {
        let mut params = ToolParameters::new();
        params.insert("search".into(), ToolParameter::optional("string", "query"));
        params
    }

    fn use_cases(&self) -> Vec<String> {
        vec![]
    }

    async fn run(&self, arguments: &Map<String, Value>, query: &str) -> anyhow::Result<ToolResult> {
        self.queries.lock().unwrap().push(query.to_string());
        self.arguments.lock().unwrap().push(arguments.clone());
        self.result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(anyhow::anyhow!("tool already used")))
    }
}
