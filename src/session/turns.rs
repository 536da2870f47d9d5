//! Transcript turn construction for batch settlement.
//!
//! After a batch of tool calls settles, the loop appends three turns in fixed
//! order: the agent's requests, the matching results, and a human continuation
//! carrying the settle screenshot. The generation provider correlates results
//! to requests positionally, so result order must mirror request order.

use crate::surface::CapturedFrame;
use crate::types::{ContentUnit, ConversationTurn, Role, ToolCallStatus, ToolOutcome};
use serde_json::Value;

/// Captures travel base64-encoded; nothing between the surface client and
/// the provider re-encodes them.
const SCREEN_MIME: &str = "image/png";

pub(super) const INITIAL_SCREEN_TEXT: &str = "This is the current state of the screen.";

/// One fully settled tool call, ready to fold into the transcript.
#[derive(Debug, Clone)]
pub(super) struct SettledCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    pub status: ToolCallStatus,
    pub outcome: ToolOutcome,
}

/// Human-authored opener giving the model its first look at the screen.
pub(super) fn initial_screen_turn(frame: &CapturedFrame) -> ConversationTurn {
    ConversationTurn::new(
        Role::Human,
        vec![
            ContentUnit::Text {
                text: INITIAL_SCREEN_TEXT.to_string(),
            },
            screen_image(frame),
        ],
    )
}

/// Agent-authored turn recording the batch's requests, prefixed with whatever
/// text the model produced in the same generation turn.
pub(super) fn request_turn(text: &str, calls: &[SettledCall]) -> ConversationTurn {
    let mut content = Vec::with_capacity(calls.len() + 1);
    if !text.is_empty() {
        content.push(ContentUnit::Text {
            text: text.to_string(),
        });
    }
    for call in calls {
        content.push(ContentUnit::ToolRequest {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        });
    }
    ConversationTurn::new(Role::Agent, content)
}

/// Human-authored turn answering every request of the batch, request order.
pub(super) fn result_turn(calls: &[SettledCall]) -> ConversationTurn {
    let content = calls
        .iter()
        .map(|call| ContentUnit::ToolResult {
            id: call.id.clone(),
            name: call.name.clone(),
            outcome: call.outcome.clone(),
        })
        .collect();
    ConversationTurn::new(Role::Human, content)
}

/// Human-authored continuation carrying the settle screenshot.
pub(super) fn continuation_turn(prompt: &str, frame: &CapturedFrame) -> ConversationTurn {
    ConversationTurn::new(
        Role::Human,
        vec![
            ContentUnit::Text {
                text: prompt.to_string(),
            },
            screen_image(frame),
        ],
    )
}

fn screen_image(frame: &CapturedFrame) -> ContentUnit {
    ContentUnit::InlineImage {
        mime: SCREEN_MIME.to_string(),
        data: frame.data.clone(),
    }
}
