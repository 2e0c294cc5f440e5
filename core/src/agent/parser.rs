use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const TOOL_CALL_OPEN: &str = "<tool_call>";
pub const TOOL_CALL_CLOSE: &str = "</tool_call>";

/// First character of the opening tag. A turn whose text starts with it is
/// buffered as a tool call instead of being streamed to the user.
pub const TOOL_CALL_SENTINEL: char = '<';

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Accepts code fences, single-quoted JSON, trailing text and a missing
    /// closing tag.
    #[default]
    Lenient,
    /// Requires both tags around exactly one double-quoted JSON object.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Map<String, Value>,
}

pub fn contains_envelope(text: &str) -> bool {
    text.contains(TOOL_CALL_OPEN)
}

pub fn parse_tool_call(text: &str, mode: ParseMode) -> EngineResult<ToolInvocation> {
    let start = text
        .find(TOOL_CALL_OPEN)
        .ok_or_else(|| EngineError::parse(format!("missing {TOOL_CALL_OPEN} tag")))?;
    let after_open = &text[start + TOOL_CALL_OPEN.len()..];
    let close = after_open.find(TOOL_CALL_CLOSE);

    match mode {
        ParseMode::Strict => {
            let close = close
                .ok_or_else(|| EngineError::parse(format!("missing {TOOL_CALL_CLOSE} tag")))?;
            let value: Value = serde_json::from_str(after_open[..close].trim())
                .map_err(|e| EngineError::parse(e.to_string()))?;
            invocation_from_value(value)
        }
        ParseMode::Lenient => {
            let inner = match close {
                Some(close) => &after_open[..close],
                None => after_open,
            };
            parse_lenient(inner)
        }
    }
}

/// Quote swapping is all-or-nothing, so a single-quoted payload whose values
/// contain an apostrophe is still rejected.
fn parse_lenient(inner: &str) -> EngineResult<ToolInvocation> {
    let mut last_error = None;

    for candidate in [inner.to_string(), inner.replace('\'', "\"")] {
        for value in extract_json_objects(&candidate) {
            match invocation_from_value(value) {
                Ok(invocation) => return Ok(invocation),
                Err(e) => last_error = Some(e),
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        EngineError::parse(format!("no JSON object found in: {}", inner.trim()))
    }))
}

fn invocation_from_value(value: Value) -> EngineResult<ToolInvocation> {
    let Value::Object(mut object) = value else {
        return Err(EngineError::parse("tool call is not a JSON object"));
    };

    let name = match object.remove("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        _ => return Err(EngineError::parse("tool name is not a string")),
    };

    let arguments = match object.remove("arguments") {
        Some(Value::Object(arguments)) => arguments,
        _ => return Err(EngineError::parse("tool arguments is not a map")),
    };

    Ok(ToolInvocation { name, arguments })
}

/// Every balanced top-level `{...}` in `text` that parses as JSON, in order.
fn extract_json_objects(text: &str) -> Vec<Value> {
    let mut values = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escape_next => escape_next = false,
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(s) = start.take()
                    && let Ok(value) = serde_json::from_str::<Value>(&text[s..=i])
                {
                    values.push(value);
                }
            }
            _ => {}
        }
    }

    values
}
