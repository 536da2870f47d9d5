//! Wire protocol between the session loop and the client.
//!
//! One event per NDJSON line, each independently parseable. Events are
//! produced only from single-threaded points of the session driver, so the
//! channel order seen by the client always equals production order even while
//! tool executions run concurrently.

use crate::textutil::safe_prefix_by_bytes;
use crate::types::{Resolution, ToolCallStatus, ToolOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Width of one `tool-argument-delta` slice. Serialized arguments are
/// re-sliced at UTF-8 boundaries, so a slice may come up short of this.
pub const ARGUMENT_DELTA_SLICE_BYTES: usize = 48;

// ---------------------------------------------------------------------------
// Event schema
// ---------------------------------------------------------------------------

/// Terminal marker carried by text-shaped tool outputs. Absent means the
/// call succeeded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WireOutputStatus {
    Failed,
    Blocked,
}

/// Terminal outcome payload for `tool-output-available`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireToolOutput {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<WireOutputStatus>,
    },
    Image {
        /// Base64 image payload.
        data: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        resolution: Option<Resolution>,
    },
}

/// One discrete wire event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    /// Incremental agent text.
    TextDelta { delta: String },
    /// A new tool call was announced.
    ToolCallStart { tool_call_id: String, index: usize },
    /// The call's tool name resolved.
    ToolNameDelta {
        tool_call_id: String,
        tool_name: String,
    },
    /// Raw argument text chunk for a call.
    ToolArgumentDelta { tool_call_id: String, delta: String },
    /// Final parsed arguments for a call; execution is about to start.
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    /// Terminal outcome for a call.
    ToolOutputAvailable {
        tool_call_id: String,
        output: WireToolOutput,
    },
    /// Surface snapshot (base64), emitted once per settled batch and once at
    /// session start.
    ScreenshotUpdate {
        screenshot: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        resolution: Option<Resolution>,
    },
    /// Session-fatal or per-call error text.
    Error { error_text: String },
}

impl StreamEvent {
    /// Wire tag for logging and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text-delta",
            Self::ToolCallStart { .. } => "tool-call-start",
            Self::ToolNameDelta { .. } => "tool-name-delta",
            Self::ToolArgumentDelta { .. } => "tool-argument-delta",
            Self::ToolInputAvailable { .. } => "tool-input-available",
            Self::ToolOutputAvailable { .. } => "tool-output-available",
            Self::ScreenshotUpdate { .. } => "screenshot-update",
            Self::Error { .. } => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// NDJSON framing
// ---------------------------------------------------------------------------

/// Serialize one event as a single NDJSON line (no trailing newline).
pub fn encode_event_line(event: &StreamEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

/// Parse one NDJSON line into an event. Callers skip blank lines themselves.
pub fn parse_event_line(line: &str) -> Result<StreamEvent, serde_json::Error> {
    serde_json::from_str(line.trim_end_matches('\r'))
}

/// Slice serialized arguments into UTF-8-safe chunks of at most
/// [`ARGUMENT_DELTA_SLICE_BYTES`] bytes each.
pub fn argument_slices(serialized: &str) -> Vec<String> {
    let mut slices = Vec::new();
    let mut rest = serialized;
    while !rest.is_empty() {
        let take = safe_prefix_by_bytes(rest, ARGUMENT_DELTA_SLICE_BYTES);
        slices.push(take.to_string());
        rest = &rest[take.len()..];
    }
    slices
}

// ---------------------------------------------------------------------------
// Outcome <-> wire mapping
// ---------------------------------------------------------------------------

/// Convert a terminal call status plus outcome into the wire output shape.
pub fn wire_output(status: ToolCallStatus, outcome: &ToolOutcome) -> WireToolOutput {
    let marker = match status {
        ToolCallStatus::Failed => Some(WireOutputStatus::Failed),
        ToolCallStatus::Blocked => Some(WireOutputStatus::Blocked),
        _ => None,
    };
    match outcome {
        ToolOutcome::Text { text } => WireToolOutput::Text {
            text: text.clone(),
            status: marker,
        },
        ToolOutcome::Error { message } => WireToolOutput::Text {
            text: message.clone(),
            status: marker,
        },
        ToolOutcome::Image { data, resolution } => WireToolOutput::Image {
            data: data.clone(),
            resolution: *resolution,
        },
    }
}

/// Terminal status implied by a wire output shape.
pub fn terminal_status_of(output: &WireToolOutput) -> ToolCallStatus {
    match output {
        WireToolOutput::Text {
            status: Some(WireOutputStatus::Failed),
            ..
        } => ToolCallStatus::Failed,
        WireToolOutput::Text {
            status: Some(WireOutputStatus::Blocked),
            ..
        } => ToolCallStatus::Blocked,
        WireToolOutput::Text { status: None, .. } | WireToolOutput::Image { .. } => {
            ToolCallStatus::Succeeded
        }
    }
}

// ---------------------------------------------------------------------------
// Event sink
// ---------------------------------------------------------------------------

/// Sender half of a session's event stream.
///
/// Emission never blocks and never errors outward: once the receiving side
/// goes away the sink flips to closed and later emissions become no-ops, so
/// in-flight work can finish without observing the disconnect as a failure.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
    closed: Arc<AtomicBool>,
}

impl EventSink {
    /// Create a sink plus the receiver the transport drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    /// Emit one event in production order.
    pub fn emit(&self, event: StreamEvent) {
        if self.closed.load(Ordering::Relaxed) {
            return;
        }
        tracing::trace!(label = event.label(), "emit stream event");
        if self.tx.send(event).is_err() {
            self.closed.store(true, Ordering::Relaxed);
            tracing::debug!("event stream receiver dropped; muting further emission");
        }
    }

    /// Convenience wrapper for `error` events.
    pub fn emit_error(&self, text: impl Into<String>) {
        self.emit(StreamEvent::Error {
            error_text: text.into(),
        });
    }

    /// Whether the receiving side has gone away. Checks the channel directly
    /// so a disconnect is visible even before the next failed send.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed) || self.tx.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
