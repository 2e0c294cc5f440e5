use crate::agent::parser::TOOL_CALL_SENTINEL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnMode {
    Unclassified,
    PlainText,
    ToolCall,
}

/// Classifies a streamed turn from its first visible character and decides
/// which deltas reach the user.
///
/// Every delta is accumulated. Plain-text turns forward each delta as it
/// arrives; tool-call turns forward nothing.
#[derive(Debug)]
pub struct TurnClassifier {
    mode: TurnMode,
    content: String,
    held: String,
}

impl Default for TurnClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnClassifier {
    pub fn new() -> Self {
        Self {
            mode: TurnMode::Unclassified,
            content: String::new(),
            held: String::new(),
        }
    }

    pub fn mode(&self) -> TurnMode {
        self.mode
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }

    /// Feeds one delta and returns the text to forward to the user, if any.
    pub fn feed(&mut self, delta: &str) -> Option<String> {
        if delta.is_empty() {
            return None;
        }
        self.content.push_str(delta);

        match self.mode {
            TurnMode::PlainText => Some(delta.to_string()),
            TurnMode::ToolCall => None,
            TurnMode::Unclassified => match delta.trim_start().chars().next() {
                None => {
                    self.held.push_str(delta);
                    None
                }
                Some(TOOL_CALL_SENTINEL) => {
                    tracing::debug!("Turn classified as tool call");
                    self.mode = TurnMode::ToolCall;
                    self.held.clear();
                    None
                }
                Some(_) => {
                    self.mode = TurnMode::PlainText;
                    let mut out = std::mem::take(&mut self.held);
                    out.push_str(delta);
                    Some(out)
                }
            },
        }
    }

    /// Settles the turn. A turn that never produced visible text counts as
    /// plain text; its held whitespace is returned for forwarding.
    pub fn finish(&mut self) -> Option<String> {
        if self.mode == TurnMode::Unclassified {
            self.mode = TurnMode::PlainText;
        }
        let held = std::mem::take(&mut self.held);
        (!held.is_empty()).then_some(held)
    }
}
