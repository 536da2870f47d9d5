//! Client-side event reducer.
//!
//! Folds the session's wire stream into a displayable view: an ordered list
//! of messages holding text, tool invocations, and screenshots. The fold is
//! deterministic; applying the same event sequence from an empty state always
//! produces the same view, so a client can replay a captured stream at any
//! time. Call records are created once on `tool-call-start` and mutated in
//! place through the id registry as later events for the same id arrive.

use crate::protocol::{terminal_status_of, StreamEvent, WireToolOutput};
use crate::textutil::truncate_with_suffix_by_chars;
use crate::types::{Resolution, ToolCallStatus};
use serde_json::Value;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// View shapes
// ---------------------------------------------------------------------------

/// One mutable tool-call card in the view.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    /// 0-based position within the turn that announced it.
    pub index: usize,
    pub name: String,
    pub status: ToolCallStatus,
    /// Best-known parsed arguments; a live preview until the final input
    /// arrives, authoritative afterwards.
    pub arguments: Value,
    /// Raw argument text accumulated from deltas.
    pub args_text: String,
    pub outcome: Option<WireToolOutput>,
}

/// One rendered unit inside a message.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayPart {
    Text { text: String },
    ToolInvocation(ToolInvocation),
    Screenshot {
        /// Base64 image payload.
        data: String,
        resolution: Option<Resolution>,
        /// Ordinal of the event that carried this capture. Stands in for a
        /// wall-clock timestamp so replays stay deterministic.
        captured_seq: u64,
    },
}

/// One message slot in the reconstructed transcript.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayMessage {
    parts: Vec<DisplayPart>,
}

impl DisplayMessage {
    pub fn parts(&self) -> &[DisplayPart] {
        &self.parts
    }
}

// ---------------------------------------------------------------------------
// Reducer
// ---------------------------------------------------------------------------

/// The reconstructed client view, built by folding events in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientViewState {
    messages: Vec<DisplayMessage>,
    /// Call id to (message, part) location of its invocation card.
    call_locations: HashMap<String, (usize, usize)>,
    /// Index of the message an agent text blob is currently growing in.
    open_text: Option<usize>,
    /// Session-level failure signals, in arrival order.
    errors: Vec<String>,
    events_applied: u64,
}

impl ClientViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a whole event sequence from the empty state.
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a StreamEvent>) -> Self {
        let mut state = Self::new();
        for event in events {
            state.apply(event);
        }
        state
    }

    /// Apply one event. Unknown call ids and post-terminal mutations are
    /// ignored rather than treated as errors, so a truncated or stitched
    /// stream still reduces cleanly.
    pub fn apply(&mut self, event: &StreamEvent) {
        self.events_applied += 1;
        match event {
            StreamEvent::TextDelta { delta } => self.append_text(delta),
            StreamEvent::ToolCallStart {
                tool_call_id,
                index,
            } => self.open_invocation(tool_call_id, *index),
            StreamEvent::ToolNameDelta {
                tool_call_id,
                tool_name,
            } => {
                self.mutate_call(tool_call_id, |call| {
                    call.name = tool_name.clone();
                });
            }
            StreamEvent::ToolArgumentDelta {
                tool_call_id,
                delta,
            } => {
                self.mutate_call(tool_call_id, |call| {
                    call.args_text.push_str(delta);
                    // Live preview: keep the previous parse on failure.
                    if let Ok(parsed) = serde_json::from_str::<Value>(&call.args_text) {
                        if parsed.is_object() {
                            call.arguments = parsed;
                        }
                    }
                });
            }
            StreamEvent::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            } => {
                self.mutate_call(tool_call_id, |call| {
                    call.name = tool_name.clone();
                    call.arguments = input.clone();
                    call.status = ToolCallStatus::Executing;
                });
            }
            StreamEvent::ToolOutputAvailable {
                tool_call_id,
                output,
            } => {
                self.mutate_call(tool_call_id, |call| {
                    call.status = terminal_status_of(output);
                    call.outcome = Some(output.clone());
                });
            }
            StreamEvent::ScreenshotUpdate {
                screenshot,
                resolution,
            } => {
                self.open_text = None;
                let captured_seq = self.events_applied;
                self.messages.push(DisplayMessage {
                    parts: vec![DisplayPart::Screenshot {
                        data: screenshot.clone(),
                        resolution: *resolution,
                        captured_seq,
                    }],
                });
            }
            StreamEvent::Error { error_text } => {
                self.errors.push(error_text.clone());
            }
        }
    }

    fn append_text(&mut self, delta: &str) {
        if let Some(index) = self.open_text {
            if let Some(DisplayPart::Text { text }) = self.messages[index].parts.first_mut() {
                text.push_str(delta);
                return;
            }
        }
        self.messages.push(DisplayMessage {
            parts: vec![DisplayPart::Text {
                text: delta.to_string(),
            }],
        });
        self.open_text = Some(self.messages.len() - 1);
    }

    fn open_invocation(&mut self, id: &str, index: usize) {
        if self.call_locations.contains_key(id) {
            return;
        }
        self.open_text = None;
        self.messages.push(DisplayMessage {
            parts: vec![DisplayPart::ToolInvocation(ToolInvocation {
                id: id.to_string(),
                index,
                name: String::new(),
                status: ToolCallStatus::ArgumentsStreaming,
                arguments: Value::Object(serde_json::Map::new()),
                args_text: String::new(),
                outcome: None,
            })],
        });
        self.call_locations
            .insert(id.to_string(), (self.messages.len() - 1, 0));
    }

    fn mutate_call(&mut self, id: &str, mutate: impl FnOnce(&mut ToolInvocation)) {
        let Some(&(message, part)) = self.call_locations.get(id) else {
            return;
        };
        if let Some(DisplayPart::ToolInvocation(call)) =
            self.messages[message].parts.get_mut(part)
        {
            if call.status.is_terminal() {
                return;
            }
            mutate(call);
        }
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    /// Session-level error signals observed so far.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Look up a tool invocation card by call id.
    pub fn call(&self, id: &str) -> Option<&ToolInvocation> {
        let &(message, part) = self.call_locations.get(id)?;
        match self.messages.get(message)?.parts.get(part)? {
            DisplayPart::ToolInvocation(call) => Some(call),
            _ => None,
        }
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied
    }

    /// One line per message, for terminal replay output.
    pub fn summary(&self) -> String {
        let mut lines = Vec::with_capacity(self.messages.len() + self.errors.len());
        for (i, message) in self.messages.iter().enumerate() {
            for part in message.parts() {
                let line = match part {
                    DisplayPart::Text { text } => {
                        format!("{i:>4}  text        {}", first_line(text))
                    }
                    DisplayPart::ToolInvocation(call) => format!(
                        "{i:>4}  tool        {} [{}] {}",
                        call.name,
                        status_word(call.status),
                        first_line(&call.args_text),
                    ),
                    DisplayPart::Screenshot {
                        data, resolution, ..
                    } => {
                        let size = resolution
                            .map(|r| format!("{}x{}", r.width, r.height))
                            .unwrap_or_else(|| "unknown size".to_string());
                        format!("{i:>4}  screenshot  {size}, {} bytes base64", data.len())
                    }
                };
                lines.push(line);
            }
        }
        for error in &self.errors {
            lines.push(format!("   !  error       {}", first_line(error)));
        }
        lines.join("\n")
    }
}

fn status_word(status: ToolCallStatus) -> &'static str {
    match status {
        ToolCallStatus::Announced => "announced",
        ToolCallStatus::ArgumentsStreaming => "streaming",
        ToolCallStatus::ArgumentsReady => "ready",
        ToolCallStatus::Executing => "executing",
        ToolCallStatus::Succeeded => "succeeded",
        ToolCallStatus::Failed => "failed",
        ToolCallStatus::Blocked => "blocked",
    }
}

/// Width cap for one summary line's payload text.
const SUMMARY_PREVIEW_CHARS: usize = 120;

fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    truncate_with_suffix_by_chars(line, SUMMARY_PREVIEW_CHARS, "...")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
