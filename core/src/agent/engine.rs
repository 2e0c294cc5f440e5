use crate::agent::history::History;
use crate::agent::parser::{ParseMode, ToolInvocation, contains_envelope, parse_tool_call};
use crate::agent::registry::ToolRegistry;
use crate::agent::stream::{TurnClassifier, TurnMode};
use crate::error::{EngineError, EngineResult};
use crate::traits::{ChatMessage, Provider, ToolOutput};
use futures_util::StreamExt;
use futures_util::future::join_all;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

const SEARCH_ARGUMENT: &str = "search";
const SUMMARIZE_PREFIX: &str =
    "Please summarize and extract the key information from the following text: ";
const SOURCES_PREFIX: &str = "Here are some sources to help you:";

/// Owns the dialogue history of one session and drives streamed turns
/// against a provider, dispatching tool calls found in the model's output.
///
/// `send_request` takes `&mut self`, so a single engine never has two turns
/// in flight.
pub struct ConversationEngine {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    history: History,
    parse_mode: ParseMode,
    session_id: String,
}

impl ConversationEngine {
    pub fn new(provider: Arc<dyn Provider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            history: History::new(),
            parse_mode: ParseMode::default(),
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn parse_mode(&self) -> ParseMode {
        self.parse_mode
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.history.set_system_prompt(prompt);
    }

    /// Forgets every turn, keeping the system prompt. Returns the number of
    /// entries dropped.
    pub fn reset(&mut self) -> usize {
        let dropped = self.history.turn_entries();
        self.history.clear();
        dropped
    }

    /// Runs one turn. Plain-text deltas are passed to `on_output` as they
    /// stream in; for tool calls only the final answer is. Returns the
    /// content recorded as the assistant's reply.
    pub async fn send_request<F>(&mut self, input: &str, mut on_output: F) -> EngineResult<String>
    where
        F: FnMut(&str) + Send,
    {
        self.history.push(ChatMessage::user(input));

        let mut stream = self
            .provider
            .complete_stream(self.history.messages())
            .await
            .map_err(EngineError::Transport)?;

        let mut classifier = TurnClassifier::new();
        while let Some(event) = stream.next().await {
            let event = event.map_err(EngineError::Transport)?;
            if let Some(text) = classifier.feed(&event.delta) {
                on_output(&text);
            }
            if event.done {
                break;
            }
        }
        if let Some(text) = classifier.finish() {
            on_output(&text);
        }

        let mode = classifier.mode();
        let content = classifier.into_content();
        let checkpoint = self.history.checkpoint();
        self.history.push(ChatMessage::assistant(content.clone()));

        if mode != TurnMode::ToolCall {
            return Ok(content);
        }

        debug!(session = %self.session_id, "Tool call detected");
        match self.process_tool_call(&content).await {
            Ok(answer) => {
                self.history.rollback(checkpoint);
                self.history.push(ChatMessage::assistant(answer.clone()));
                on_output(&answer);
                Ok(answer)
            }
            Err(e) => {
                self.history.rollback(checkpoint);
                warn!(session = %self.session_id, "Tool call failed, turn rolled back: {}", e);
                Err(e)
            }
        }
    }

    async fn process_tool_call(&self, content: &str) -> EngineResult<String> {
        if !contains_envelope(content) {
            return Err(EngineError::parse(
                "response started like a tool call but contains no <tool_call> envelope",
            ));
        }

        let ToolInvocation { name, arguments } = parse_tool_call(content, self.parse_mode)?;
        debug!(session = %self.session_id, tool = %name, "Dispatching tool call: {:?}", arguments);

        let tool = self
            .registry
            .get(&name)
            .ok_or_else(|| EngineError::ToolNotFound(name.clone()))?;

        let query = self.effective_query(&arguments);
        let result = tool
            .run(&arguments, &query)
            .await
            .map_err(|reason| EngineError::ToolExecution {
                name: name.clone(),
                reason,
            })?;

        if !result.success {
            let reason = match result.output {
                ToolOutput::Text(text) if !text.is_empty() => anyhow::anyhow!(text),
                _ => anyhow::anyhow!("tool reported failure"),
            };
            return Err(EngineError::ToolExecution { name, reason });
        }

        match result.output {
            ToolOutput::Text(text) => Ok(text),
            ToolOutput::Prompts(prompts) => self.summarize(prompts, &query).await,
        }
    }

    /// The `search` argument when present, otherwise the user message that
    /// precedes the tool-call payload.
    fn effective_query(&self, arguments: &Map<String, Value>) -> String {
        if let Some(search) = arguments.get(SEARCH_ARGUMENT).and_then(Value::as_str) {
            return search.to_string();
        }
        self.history
            .nth_from_end(1)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// Summarizes each raw prompt in its own task, then answers `query` from
    /// the summaries that succeeded.
    async fn summarize(&self, prompts: Vec<String>, query: &str) -> EngineResult<String> {
        debug!(session = %self.session_id, "Summarizing {} sources", prompts.len());

        let handles: Vec<_> = prompts
            .into_iter()
            .map(|prompt| {
                let provider = Arc::clone(&self.provider);
                tokio::spawn(async move {
                    let input = format!("{SUMMARIZE_PREFIX}{prompt}");
                    complete_without_memory(provider.as_ref(), &[input]).await
                })
            })
            .collect();

        let mut sources = Vec::with_capacity(handles.len() + 1);
        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            match joined {
                Ok(Ok(summary)) => sources.push(summary),
                Ok(Err(e)) => warn!("Summarization of source {} failed: {:#}", index + 1, e),
                Err(e) => warn!("Summarization task {} did not complete: {}", index + 1, e),
            }
        }

        sources.push(format!(
            "user query: {query}\n NOTE: Be concise, short and specific, and you must answer with the same language as the user query."
        ));

        complete_without_memory(self.provider.as_ref(), &sources)
            .await
            .map_err(EngineError::Transport)
    }
}

/// Message list for a request that is independent of any conversation.
pub fn no_memory_messages(inputs: &[String]) -> Vec<ChatMessage> {
    let inputs: Vec<&str> = inputs
        .iter()
        .map(String::as_str)
        .filter(|input| !input.trim().is_empty())
        .collect();

    let Some((last, sources)) = inputs.split_last() else {
        return Vec::new();
    };

    let mut messages = Vec::with_capacity(2);
    if !sources.is_empty() {
        messages.push(ChatMessage::user(format!(
            "{SOURCES_PREFIX}\n{}",
            sources.join("\n")
        )));
    }
    messages.push(ChatMessage::user(*last));
    messages
}

pub async fn complete_without_memory(
    provider: &dyn Provider,
    inputs: &[String],
) -> anyhow::Result<String> {
    let messages = no_memory_messages(inputs);
    if messages.is_empty() {
        anyhow::bail!("no input for request");
    }
    let response = provider.complete(&messages).await?;
    Ok(response.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{Chunk, RecordingTool, ScriptedProvider, deltas};
    use crate::traits::{Role, Tool, ToolResult};

    fn engine_with(provider: ScriptedProvider, tools: Vec<Arc<RecordingTool>>) -> (ConversationEngine, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool.name().to_string(), tool);
        }
        let engine = ConversationEngine::new(provider.clone(), Arc::new(registry));
        (engine, provider)
    }

    async fn send(engine: &mut ConversationEngine, input: &str) -> (EngineResult<String>, Vec<String>) {
        let mut forwarded = Vec::new();
        let result = engine
            .send_request(input, |text| forwarded.push(text.to_string()))
            .await;
        (result, forwarded)
    }

    #[tokio::test]
    async fn plain_text_turn_streams_and_appends_two_entries() {
        let provider = ScriptedProvider::new().with_stream(deltas(&["Hello", " there", "!"]));
        let (mut engine, provider) = engine_with(provider, vec![]);

        let (result, forwarded) = send(&mut engine, "hi").await;

        assert_eq!(result.unwrap(), "Hello there!");
        assert_eq!(forwarded, vec!["Hello", " there", "!"]);
        assert_eq!(engine.history().len(), 2);
        assert_eq!(engine.history().last().unwrap().role, Role::Assistant);
        assert_eq!(provider.stream_calls.lock().unwrap()[0], vec![ChatMessage::user("hi")]);
    }

    #[tokio::test]
    async fn trailing_content_on_final_event_is_forwarded() {
        let provider = ScriptedProvider::new().with_stream(vec![
            Chunk::Delta("Hel".into()),
            Chunk::Done("lo".into()),
            Chunk::Delta("ignored".into()),
        ]);
        let (mut engine, _) = engine_with(provider, vec![]);

        let (result, forwarded) = send(&mut engine, "hi").await;

        assert_eq!(result.unwrap(), "Hello");
        assert_eq!(forwarded, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn open_app_end_to_end() {
        let tool = Arc::new(RecordingTool::new(
            "open_app_macos",
            Ok(ToolResult::text("The application has been opened.")),
        ));
        let provider = ScriptedProvider::new().with_stream(deltas(&[
            "<tool_call>",
            "{\"name\": \"open_app_macos\", ",
            "\"arguments\": {\"app\": \"Calculator\"}}",
            "</tool_call>",
        ]));
        let (mut engine, _) = engine_with(provider, vec![tool.clone()]);

        let (result, forwarded) = send(&mut engine, "open app Calculator").await;

        assert_eq!(result.unwrap(), "The application has been opened.");
        assert_eq!(forwarded, vec!["The application has been opened."]);
        assert_eq!(engine.history().len(), 2);
        assert_eq!(
            engine.history().last().unwrap().content,
            "The application has been opened."
        );
        assert_eq!(tool.arguments.lock().unwrap()[0]["app"], "Calculator");
        assert_eq!(tool.last_query().unwrap(), "open app Calculator");
    }

    #[tokio::test]
    async fn search_argument_overrides_user_message() {
        let tool = Arc::new(RecordingTool::new("weather", Ok(ToolResult::text("Sunny"))));
        let provider = ScriptedProvider::new().with_stream(deltas(&[
            "<tool_call>{'name': 'weather', 'arguments': {'search': 'tokyo weather'}}</tool_call>",
        ]));
        let (mut engine, _) = engine_with(provider, vec![tool.clone()]);

        let (result, _) = send(&mut engine, "what's it like outside").await;

        assert_eq!(result.unwrap(), "Sunny");
        assert_eq!(tool.last_query().unwrap(), "tokyo weather");
    }

    #[tokio::test]
    async fn unparseable_tool_call_rolls_back() {
        let provider = ScriptedProvider::new().with_stream(deltas(&["<tool_call>{name: oops</tool_call>"]));
        let (mut engine, _) = engine_with(provider, vec![]);

        let (result, forwarded) = send(&mut engine, "do it").await;

        assert!(matches!(result, Err(EngineError::ToolCallParse(_))));
        assert!(forwarded.is_empty());
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.history().last().unwrap().content, "do it");
    }

    #[tokio::test]
    async fn sentinel_without_envelope_is_an_error() {
        let provider = ScriptedProvider::new().with_stream(deltas(&["<b>bold</b> answer"]));
        let (mut engine, _) = engine_with(provider, vec![]);

        let (result, forwarded) = send(&mut engine, "format this").await;

        assert!(matches!(result, Err(EngineError::ToolCallParse(_))));
        assert!(forwarded.is_empty());
        assert_eq!(engine.history().len(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_rolls_back() {
        let provider = ScriptedProvider::new()
            .with_stream(deltas(&["<tool_call>{\"name\": \"nope\", \"arguments\": {}}</tool_call>"]));
        let (mut engine, _) = engine_with(provider, vec![]);

        let (result, _) = send(&mut engine, "q").await;

        assert!(matches!(result, Err(EngineError::ToolNotFound(name)) if name == "nope"));
        assert_eq!(engine.history().len(), 1);
    }

    #[tokio::test]
    async fn tool_failure_rolls_back() {
        let tool = Arc::new(RecordingTool::new("cmd", Err(anyhow::anyhow!("exit status 2"))));
        let provider = ScriptedProvider::new()
            .with_stream(deltas(&["<tool_call>{\"name\": \"cmd\", \"arguments\": {}}</tool_call>"]));
        let (mut engine, _) = engine_with(provider, vec![tool]);

        let (result, _) = send(&mut engine, "q").await;

        assert!(matches!(result, Err(EngineError::ToolExecution { .. })));
        assert_eq!(engine.history().len(), 1);
    }

    #[tokio::test]
    async fn transport_errors_keep_user_message() {
        let (mut engine, _) = engine_with(ScriptedProvider::new().with_connect_error("refused"), vec![]);
        let (result, _) = send(&mut engine, "first").await;
        assert!(matches!(result, Err(EngineError::Transport(_))));
        assert_eq!(engine.history().len(), 1);

        let provider = ScriptedProvider::new().with_stream(vec![
            Chunk::Delta("Par".into()),
            Chunk::Fail("connection reset".into()),
        ]);
        let (mut engine, _) = engine_with(provider, vec![]);
        let (result, forwarded) = send(&mut engine, "second").await;
        assert!(matches!(result, Err(EngineError::Transport(_))));
        assert_eq!(forwarded, vec!["Par"]);
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.history().last().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn failed_summary_is_dropped_from_aggregation() {
        let tool = Arc::new(RecordingTool::new(
            "browser",
            Ok(ToolResult::prompts(vec![
                "first page".into(),
                "second page".into(),
                "third page".into(),
            ])),
        ));
        let provider = ScriptedProvider::new()
            .with_stream(deltas(&["<tool_call>{\"name\": \"browser\", \"arguments\": {\"search\": \"rust news\"}}</tool_call>"]))
            .with_responder(|messages| {
                let last = &messages.last().unwrap().content;
                if last.starts_with("user query:") {
                    return Ok("final answer".to_string());
                }
                if last.contains("second page") {
                    anyhow::bail!("model overloaded");
                }
                Ok(format!("summary of {}", last.trim_start_matches(SUMMARIZE_PREFIX)))
            });
        let (mut engine, provider) = engine_with(provider, vec![tool]);

        let (result, forwarded) = send(&mut engine, "what's new in rust?").await;

        assert_eq!(result.unwrap(), "final answer");
        assert_eq!(forwarded, vec!["final answer"]);
        assert_eq!(engine.history().len(), 2);
        assert_eq!(provider.complete_calls.lock().unwrap().len(), 4);

        let final_call = provider.last_complete_call();
        assert_eq!(final_call.len(), 2);
        let sources = &final_call[0].content;
        assert_eq!(sources.matches("summary of").count(), 2);
        assert!(sources.contains("summary of first page"));
        assert!(sources.contains("summary of third page"));
        assert!(!sources.contains("second page"));
        assert!(final_call[1].content.starts_with("user query: rust news\n"));
    }

    #[tokio::test]
    async fn summaries_run_concurrently() {
        let tool = Arc::new(RecordingTool::new(
            "browser",
            Ok(ToolResult::prompts(vec!["a".into(), "b".into(), "c".into()])),
        ));
        let provider = ScriptedProvider::new()
            .with_stream(deltas(&["<tool_call>{\"name\": \"browser\", \"arguments\": {}}</tool_call>"]))
            .with_complete_delay(std::time::Duration::from_millis(200));
        let (mut engine, provider) = engine_with(provider, vec![tool]);

        let started = std::time::Instant::now();
        let (result, _) = send(&mut engine, "news?").await;
        let elapsed = started.elapsed();

        assert!(result.is_ok());
        assert_eq!(provider.complete_calls.lock().unwrap().len(), 4);
        assert_eq!(provider.peak_in_flight.load(std::sync::atomic::Ordering::SeqCst), 3);
        // three parallel summaries plus the final request
        assert!(elapsed < std::time::Duration::from_millis(700), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn all_summaries_failing_still_aggregates() {
        let tool = Arc::new(RecordingTool::new(
            "browser",
            Ok(ToolResult::prompts(vec!["a".into(), "b".into()])),
        ));
        let provider = ScriptedProvider::new()
            .with_stream(deltas(&["<tool_call>{\"name\": \"browser\", \"arguments\": {}}</tool_call>"]))
            .with_responder(|messages| {
                let last = &messages.last().unwrap().content;
                if last.starts_with("user query:") {
                    Ok("nothing found".to_string())
                } else {
                    anyhow::bail!("down")
                }
            });
        let (mut engine, provider) = engine_with(provider, vec![tool]);

        let (result, _) = send(&mut engine, "anything?").await;

        assert_eq!(result.unwrap(), "nothing found");
        let final_call = provider.last_complete_call();
        assert_eq!(final_call.len(), 1);
        assert!(final_call[0].content.starts_with("user query: anything?"));
    }

    #[tokio::test]
    async fn history_carries_across_turns() {
        let provider = ScriptedProvider::new()
            .with_stream(deltas(&["One"]))
            .with_stream(deltas(&["Two"]));
        let (mut engine, provider) = engine_with(provider, vec![]);
        engine.set_system_prompt("sys");

        send(&mut engine, "first").await.0.unwrap();
        send(&mut engine, "second").await.0.unwrap();

        assert_eq!(engine.history().len(), 5);
        let calls = provider.stream_calls.lock().unwrap();
        assert_eq!(calls[1].len(), 4);
        assert_eq!(calls[1][0].role, Role::System);
        assert_eq!(calls[1][2], ChatMessage::assistant("One"));
    }

    #[test]
    fn no_memory_messages_split_sources_from_instruction() {
        let inputs = vec!["s1".to_string(), String::new(), "s2".to_string(), "question".to_string()];
        let messages = no_memory_messages(&inputs);
        assert_eq!(
            messages,
            vec![
                ChatMessage::user(format!("{SOURCES_PREFIX}\ns1\ns2")),
                ChatMessage::user("question"),
            ]
        );
        assert_eq!(no_memory_messages(&["only".to_string()]), vec![ChatMessage::user("only")]);
        assert!(no_memory_messages(&[]).is_empty());
    }
}
