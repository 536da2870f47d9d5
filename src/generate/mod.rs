//! Streaming client seam for the planning model.
//!
//! The session loop only sees [`GenerationClient`]: one call per generation
//! turn, chunks delivered over a channel as they arrive. The production
//! implementation speaks OpenAI-compatible streaming chat completions; tests
//! script deterministic chunk sequences instead.

use crate::error::GenerationError;
use crate::types::{ToolDeclaration, Transcript};
use async_trait::async_trait;
use tokio::sync::mpsc;

mod http;
mod sse;

pub use http::HttpGenerationClient;
pub use sse::SseFrameDecoder;

/// One complete function-call request produced by a generation turn.
///
/// The transport accumulates partial provider deltas internally, so by the
/// time a request surfaces here its name is final and `arguments` holds the
/// full serialized argument text (which may still be malformed JSON; the
/// consumer decides how to degrade).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCallRequest {
    /// Requested tool name.
    pub name: String,
    /// JSON-encoded string of the arguments object.
    pub arguments: String,
}

/// One incremental content chunk of a generation turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenChunk {
    /// Incremental assistant text, when present.
    pub text: Option<String>,
    /// A completed function-call request, when present.
    pub call: Option<FunctionCallRequest>,
}

impl GenChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            call: None,
        }
    }

    pub fn call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            text: None,
            call: Some(FunctionCallRequest {
                name: name.into(),
                arguments: arguments.into(),
            }),
        }
    }
}

/// Receiver side of one generation turn; closes when the turn ends.
pub type GenChunkReceiver = mpsc::UnboundedReceiver<Result<GenChunk, GenerationError>>;

/// Interface to the planning model used by the session loop.
///
/// The transcript is passed by value so the callee never holds a reference
/// into the loop's working state across an await point.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Start one generation turn for `transcript` with `tools` declared.
    ///
    /// Returns the chunk receiver once the turn is underway; transport
    /// failures mid-stream arrive as an `Err` item followed by channel close.
    async fn stream_turn(
        &self,
        transcript: Transcript,
        tools: Vec<ToolDeclaration>,
    ) -> Result<GenChunkReceiver, GenerationError>;
}
