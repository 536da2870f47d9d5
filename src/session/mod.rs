//! The server-side session driver.
//!
//! One [`Session`] serves one human turn: it repeatedly asks the planning
//! model for a generation turn, announces the tool calls found in the stream,
//! executes each batch concurrently behind a join barrier, folds the results
//! and a single settle screenshot back into the transcript, and goes idle
//! once a turn requests nothing. Only the batch executions run concurrently;
//! the driver itself is sequential, so events always leave in production
//! order.

use crate::config::SessionConfig;
use crate::error::{SessionError, ToolError};
use crate::generate::{FunctionCallRequest, GenerationClient};
use crate::protocol::{argument_slices, wire_output, EventSink, StreamEvent};
use crate::surface::{SurfaceHandle, SurfaceLease};
use crate::tools::ToolCatalog;
use crate::types::{ToolCallStatus, ToolOutcome, Transcript};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

mod turns;

use turns::SettledCall;

/// Process-wide ordinal so call ids stay unique across sessions.
static CALL_ORDINAL: AtomicU64 = AtomicU64::new(1);

fn next_call_id(stream_tag: u32) -> String {
    let ordinal = CALL_ORDINAL.fetch_add(1, Ordering::Relaxed);
    format!("call-{stream_tag:08x}-{ordinal}")
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Driver state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    AwaitingGeneration,
    ExecutingTools,
    Idle,
    Failed,
}

/// What a finished session leaves behind.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub phase: SessionPhase,
    /// Generation rounds attempted, including one that failed.
    pub rounds: usize,
    pub transcript: Transcript,
}

/// One call announced during the current generation turn.
struct LaunchedCall {
    id: String,
    name: String,
    arguments: Value,
    work: CallWork,
}

enum CallWork {
    /// Policy refused the call before dispatch; carries the refusal text.
    Blocked(String),
    /// Execution task running concurrently with its batch siblings.
    Running(JoinHandle<Result<ToolOutcome, ToolError>>),
}

/// Everything one generation turn produced.
struct GenerationTurn {
    text: String,
    calls: Vec<LaunchedCall>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Drives one session against a leased surface and a generation client.
pub struct Session {
    client: Box<dyn GenerationClient>,
    catalog: Arc<ToolCatalog>,
    surface: SurfaceHandle,
    lease: Option<SurfaceLease>,
    sink: EventSink,
    config: SessionConfig,
    transcript: Transcript,
    phase: SessionPhase,
    rounds: usize,
    /// Random per-session tag mixed into call ids for log correlation.
    stream_tag: u32,
    /// Tool names whose first-use gate has been passed this session.
    gates_passed: HashSet<String>,
}

impl Session {
    /// Build a session holding a pool lease; the lease is released exactly
    /// once when the session finishes, on every terminal path.
    pub fn new(
        client: Box<dyn GenerationClient>,
        catalog: Arc<ToolCatalog>,
        lease: SurfaceLease,
        config: SessionConfig,
        sink: EventSink,
        transcript: Transcript,
    ) -> Self {
        let surface = lease.handle();
        Self::build(client, catalog, surface, Some(lease), config, sink, transcript)
    }

    /// Build a session against a bare surface handle, without a pool lease.
    pub fn with_surface(
        client: Box<dyn GenerationClient>,
        catalog: Arc<ToolCatalog>,
        surface: SurfaceHandle,
        config: SessionConfig,
        sink: EventSink,
        transcript: Transcript,
    ) -> Self {
        Self::build(client, catalog, surface, None, config, sink, transcript)
    }

    fn build(
        client: Box<dyn GenerationClient>,
        catalog: Arc<ToolCatalog>,
        surface: SurfaceHandle,
        lease: Option<SurfaceLease>,
        config: SessionConfig,
        sink: EventSink,
        transcript: Transcript,
    ) -> Self {
        Self {
            client,
            catalog,
            surface,
            lease,
            sink,
            config,
            transcript,
            phase: SessionPhase::AwaitingGeneration,
            rounds: 0,
            stream_tag: rand::random(),
            gates_passed: HashSet::new(),
        }
    }

    /// Run the session to a terminal state and return the report.
    ///
    /// Fatal errors are folded into the stream as a final `error` event; the
    /// surface lease is released on every path before this returns.
    pub async fn run(mut self) -> SessionReport {
        if let Err(err) = self.drive().await {
            tracing::error!(error = %err, rounds = self.rounds, "session failed");
            self.sink.emit_error(format!("session failed: {err}"));
            self.phase = SessionPhase::Failed;
        }
        if let Some(lease) = self.lease.take() {
            lease.release().await;
        }
        SessionReport {
            phase: self.phase,
            rounds: self.rounds,
            transcript: self.transcript,
        }
    }

    async fn drive(&mut self) -> Result<(), SessionError> {
        // Orient the model (and the client) with the pre-action screen state.
        let frame = self.surface.capture().await?;
        self.sink.emit(StreamEvent::ScreenshotUpdate {
            screenshot: frame.data.clone(),
            resolution: Some(frame.resolution),
        });
        self.transcript.append(turns::initial_screen_turn(&frame));

        loop {
            if self.sink.is_closed() {
                tracing::info!(rounds = self.rounds, "client went away; stopping session early");
                return Ok(());
            }
            self.rounds += 1;
            if self.rounds > self.config.max_rounds {
                return Err(SessionError::RoundCapReached(self.config.max_rounds));
            }

            self.phase = SessionPhase::AwaitingGeneration;
            let turn = self.run_generation_turn().await?;
            if turn.calls.is_empty() {
                tracing::info!(rounds = self.rounds, "turn requested no tools; session idle");
                self.phase = SessionPhase::Idle;
                return Ok(());
            }

            self.phase = SessionPhase::ExecutingTools;
            let settled = self.settle_batch(turn.calls).await;

            if self.config.settle_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
            }
            // Single post-batch readout; per-action captures would interleave
            // arbitrarily with concurrently running siblings.
            let frame = self.surface.capture().await?;
            self.sink.emit(StreamEvent::ScreenshotUpdate {
                screenshot: frame.data.clone(),
                resolution: Some(frame.resolution),
            });

            self.transcript.append(turns::request_turn(&turn.text, &settled));
            self.transcript.append(turns::result_turn(&settled));
            self.transcript.append(turns::continuation_turn(
                &self.config.continuation_prompt,
                &frame,
            ));
        }
    }

    /// Stream one generation turn, announcing and dispatching calls as they
    /// are discovered. Returns once the chunk stream ends; dispatched work is
    /// still running at that point.
    async fn run_generation_turn(&mut self) -> Result<GenerationTurn, SessionError> {
        let declarations = self.catalog.declarations();
        let mut rx = self
            .client
            .stream_turn(self.transcript.clone(), declarations)
            .await?;

        let mut text = String::new();
        let mut calls: Vec<LaunchedCall> = Vec::new();
        while let Some(item) = rx.recv().await {
            let chunk = item?;
            if let Some(delta) = chunk.text {
                if !delta.is_empty() {
                    self.sink.emit(StreamEvent::TextDelta {
                        delta: delta.clone(),
                    });
                    text.push_str(&delta);
                }
            }
            if let Some(request) = chunk.call {
                let launched = self.launch_call(calls.len(), request);
                calls.push(launched);
            }
        }
        Ok(GenerationTurn { text, calls })
    }

    /// Announce one discovered call and either dispatch it or block it at the
    /// first-use gate. Blocked attempts leave the gate shut.
    fn launch_call(&mut self, index: usize, request: FunctionCallRequest) -> LaunchedCall {
        let id = next_call_id(self.stream_tag);
        tracing::debug!(call = %id, tool = %request.name, index, "tool call announced");
        self.sink.emit(StreamEvent::ToolCallStart {
            tool_call_id: id.clone(),
            index,
        });
        self.sink.emit(StreamEvent::ToolNameDelta {
            tool_call_id: id.clone(),
            tool_name: request.name.clone(),
        });
        for slice in argument_slices(&request.arguments) {
            self.sink.emit(StreamEvent::ToolArgumentDelta {
                tool_call_id: id.clone(),
                delta: slice,
            });
        }
        let arguments = parse_arguments(&request.name, &request.arguments);
        self.sink.emit(StreamEvent::ToolInputAvailable {
            tool_call_id: id.clone(),
            tool_name: request.name.clone(),
            input: arguments.clone(),
        });

        let work = if self.gates_passed.contains(request.name.as_str()) {
            CallWork::Running(self.spawn_execution(&request.name, &arguments))
        } else if let Some(refusal) = self.catalog.first_use_gate(&request.name, &arguments) {
            tracing::info!(call = %id, tool = %request.name, "first-use policy blocked call before dispatch");
            CallWork::Blocked(refusal)
        } else {
            self.gates_passed.insert(request.name.clone());
            CallWork::Running(self.spawn_execution(&request.name, &arguments))
        };
        LaunchedCall {
            id,
            name: request.name,
            arguments,
            work,
        }
    }

    fn spawn_execution(
        &self,
        name: &str,
        input: &Value,
    ) -> JoinHandle<Result<ToolOutcome, ToolError>> {
        let catalog = Arc::clone(&self.catalog);
        let surface = self.surface.clone();
        let name = name.to_string();
        let input = input.clone();
        tokio::spawn(async move { catalog.execute(&name, &surface, &input).await })
    }

    /// Join barrier: wait for every call of the batch, in request order, and
    /// emit each terminal outcome. A failed call never aborts its siblings.
    async fn settle_batch(&self, calls: Vec<LaunchedCall>) -> Vec<SettledCall> {
        let mut settled = Vec::with_capacity(calls.len());
        for call in calls {
            let (status, outcome) = match call.work {
                CallWork::Blocked(refusal) => {
                    (ToolCallStatus::Blocked, ToolOutcome::error(refusal))
                }
                CallWork::Running(handle) => match handle.await {
                    Ok(Ok(outcome)) => (ToolCallStatus::Succeeded, outcome),
                    Ok(Err(err)) => (ToolCallStatus::Failed, ToolOutcome::error(err.to_string())),
                    Err(err) => (
                        ToolCallStatus::Failed,
                        ToolOutcome::error(format!("tool task aborted: {err}")),
                    ),
                },
            };
            tracing::debug!(call = %call.id, tool = %call.name, status = ?status, "tool call settled");
            self.sink.emit(StreamEvent::ToolOutputAvailable {
                tool_call_id: call.id.clone(),
                output: wire_output(status, &outcome),
            });
            if status == ToolCallStatus::Failed {
                if let ToolOutcome::Error { message } = &outcome {
                    self.sink
                        .emit_error(format!("tool `{}` failed: {message}", call.name));
                }
            }
            settled.push(SettledCall {
                id: call.id,
                name: call.name,
                arguments: call.arguments,
                status,
                outcome,
            });
        }
        settled
    }
}

/// Parse a serialized argument payload. Anything that is not a JSON object
/// degrades to empty arguments; the turn itself never fails over it.
fn parse_arguments(name: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => {
            tracing::warn!(tool = %name, "argument payload is not an object; substituting empty arguments");
            Value::Object(serde_json::Map::new())
        }
        Err(err) => {
            tracing::warn!(tool = %name, error = %err, "argument payload unparsable; substituting empty arguments");
            Value::Object(serde_json::Map::new())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
