//! Shared conversation data model for the orchestration loop.
//!
//! These types travel in three places: the client request body (the prior
//! transcript), the session loop's working state, and the provider mapping
//! inside the generation client. Image payloads are kept base64-encoded
//! end to end so no boundary re-encodes them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Roles and turns
// ---------------------------------------------------------------------------

/// Conversation participant role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person driving the session (and the synthetic turns the loop
    /// appends on their behalf: tool results and settle screenshots).
    Human,
    /// The planning model.
    Agent,
}

/// Pixel dimensions attached to screen captures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// One unit of turn content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentUnit {
    /// Natural-language text.
    Text { text: String },
    /// An inline image shown to the model (base64 payload).
    InlineImage { mime: String, data: String },
    /// A tool invocation requested by the agent.
    ToolRequest {
        id: String,
        name: String,
        arguments: Value,
    },
    /// The answer to a prior `ToolRequest` with the same `id`.
    ToolResult {
        id: String,
        name: String,
        outcome: ToolOutcome,
    },
}

/// Terminal result value of one tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutcome {
    Text { text: String },
    Image {
        /// Base64 image payload.
        data: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        resolution: Option<Resolution>,
    },
    Error { message: String },
}

impl ToolOutcome {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(data: impl Into<String>, resolution: Option<Resolution>) -> Self {
        Self::Image {
            data: data.into(),
            resolution,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// A single role-attributed unit of conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: Vec<ContentUnit>,
}

impl ConversationTurn {
    /// Create a turn with explicit content units.
    pub fn new(role: Role, content: Vec<ContentUnit>) -> Self {
        Self { role, content }
    }

    /// Create a human text turn.
    pub fn human_text(text: impl Into<String>) -> Self {
        Self::new(Role::Human, vec![ContentUnit::Text { text: text.into() }])
    }

    /// Create an agent text turn.
    pub fn agent_text(text: impl Into<String>) -> Self {
        Self::new(Role::Agent, vec![ContentUnit::Text { text: text.into() }])
    }

    /// Iterate this turn's tool requests in content order.
    pub fn tool_requests(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.content.iter().filter_map(|unit| match unit {
            ContentUnit::ToolRequest {
                id,
                name,
                arguments,
            } => Some((id.as_str(), name.as_str(), arguments)),
            _ => None,
        })
    }

    /// Concatenated text units of this turn.
    pub fn joined_text(&self) -> String {
        let mut parts = Vec::new();
        for unit in &self.content {
            if let ContentUnit::Text { text } = unit {
                parts.push(text.as_str());
            }
        }
        parts.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// Append-only ordered log of conversation turns.
///
/// Owned exclusively by the session loop during a session; everyone else sees
/// clones or slices. There is no removal API on purpose.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<ConversationTurn>) -> Self {
        Self { turns }
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recently appended turn.
    pub fn latest(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    /// Every turn except the most recent one (index-sliced view, no copy).
    pub fn prior(&self) -> &[ConversationTurn] {
        match self.turns.len() {
            0 => &[],
            n => &self.turns[..n - 1],
        }
    }
}

// ---------------------------------------------------------------------------
// Tool-call bookkeeping
// ---------------------------------------------------------------------------

/// Lifecycle state of one tool call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Announced,
    ArgumentsStreaming,
    ArgumentsReady,
    Executing,
    Succeeded,
    Failed,
    Blocked,
}

impl ToolCallStatus {
    /// Whether this status ends the call's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Blocked)
    }
}

// ---------------------------------------------------------------------------
// Tool declarations (published to the model)
// ---------------------------------------------------------------------------

/// Schema of one callable tool, provider-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Exposed tool name.
    pub name: String,
    /// Natural-language description of tool behavior.
    pub description: String,
    /// JSON Schema object describing the arguments.
    pub parameters: Value,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
