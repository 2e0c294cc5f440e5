use crate::agent::parser::{ParseMode, TOOL_CALL_CLOSE, TOOL_CALL_OPEN};
use crate::agent::registry::ToolRegistry;
use chrono::NaiveDate;
use std::fmt::Write;

const DEFAULT_ASSISTANT_NAME: &str = "Parley";

const INSTRUCTIONS: &[(&str, &str)] = &[
    (
        "Pre-execution Validation",
        "Execute functions only if all necessary parameters are validated for completeness and correctness. If a required parameter is missing or invalid, do not call the function and ask the user for it.",
    ),
    (
        "Mandatory Field Verification",
        "Never call a function with an empty value for a parameter listed as required.",
    ),
    (
        "Error Messaging",
        "Give clear feedback when the data provided is incomplete or invalid.",
    ),
    (
        "Language Consistency",
        "Always respond in the same language as the user's query.",
    ),
    (
        "Use of Defined Tools Only",
        "Strictly use the tools declared within the <tools></tools> XML tags; calling undeclared tools is prohibited.",
    ),
];

const FUNCTION_CALL_SCHEMA: &str = r#"{
  "properties": {
    "arguments": {"title": "Arguments", "type": "object"},
    "name": {"title": "Name", "type": "string"}
  },
  "required": ["arguments", "name"],
  "title": "FunctionCall",
  "type": "object"
}"#;

/// Builds the system message that seeds every conversation.
pub struct ContextBuilder {
    assistant_name: String,
    parse_mode: ParseMode,
    date: NaiveDate,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            parse_mode: ParseMode::default(),
            date: chrono::Local::now().date_naive(),
        }
    }

    pub fn with_assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant_name = name.into();
        self
    }

    pub fn with_parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    pub fn build_system_prompt(&self, registry: &ToolRegistry) -> anyhow::Result<String> {
        let catalog = registry.dump_catalog()?;
        let mut prompt = String::new();

        let _ = writeln!(prompt, "Today date: {}", self.date.format("%Y-%m-%d"));
        let _ = writeln!(
            prompt,
            "You are a function-calling AI model named {}. You are equipped with function signatures within <tools></tools> XML tags. Your role is to assist with user queries by appropriately calling one or more of these functions, based strictly on provided and valid data.",
            self.assistant_name
        );
        prompt.push_str("\n### Available Tools:\n<tools>\n");
        prompt.push_str(&catalog);
        prompt.push_str("\n</tools>\n\n### Instructions:\n");

        for (title, text) in INSTRUCTIONS {
            let _ = writeln!(prompt, "- **{title}**: {text}");
        }
        let _ = writeln!(
            prompt,
            "- **Function Call Format**: Use the {TOOL_CALL_OPEN}{TOOL_CALL_CLOSE} XML tags to structure function calls. If you call a function, don't include any other text in the response."
        );
        if self.parse_mode == ParseMode::Strict {
            prompt.push_str("- **Strict JSON**: The function call must be a single JSON object using double quotes, with no code fences or comments.\n");
        }
        prompt.push_str("- **Tool Call JSON Schema**: Each function call must follow the schema below.\n");

        prompt.push_str("\n### JSON Schema for Tool Calls:\n");
        prompt.push_str(FUNCTION_CALL_SCHEMA);
        let _ = write!(
            prompt,
            "\n\nFor each function call, return a JSON object with the function name and arguments within {TOOL_CALL_OPEN}{TOOL_CALL_CLOSE} XML tags as follows:\n\n{TOOL_CALL_OPEN}\n{{\"arguments\": <args-dict>, \"name\": <function-name>}}\n{TOOL_CALL_CLOSE}"
        );

        Ok(prompt)
    }
}
