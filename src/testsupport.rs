//! Shared test fixtures for config, tool, and session test modules.
//!
//! Unit tests across modules need the same three doubles: a temp dir for
//! config files, a scripted surface that records which primitives ran, and a
//! scripted generation client that replays canned rounds. Keeping them here
//! prevents each test module from rebuilding ad-hoc copies.

use crate::error::{GenerationError, SurfaceError};
use crate::generate::{GenChunk, GenChunkReceiver, GenerationClient};
use crate::surface::{
    CapturedFrame, CommandOutput, PointerButton, ScrollDirection, SurfaceHandle, SurfaceOps,
};
use crate::types::{Resolution, ToolDeclaration, Transcript};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory fixture with best-effort cleanup.
#[derive(Debug)]
pub struct TestTempDir {
    path: PathBuf,
}

impl TestTempDir {
    /// Create a unique temporary directory with a readable prefix.
    pub fn new(prefix: &str) -> Self {
        let suffix = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let dir = std::env::temp_dir().join(format!("deskpilot-{prefix}-{millis}-{suffix}"));
        fs::create_dir_all(&dir).expect("failed to create temporary fixture directory");
        Self { path: dir }
    }

    /// Root directory path for this fixture.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a child path under the fixture root.
    pub fn child(&self, relative: &str) -> PathBuf {
        self.path.join(relative)
    }

    /// Write UTF-8 text to a child path, creating parent directories as needed.
    pub fn write_text(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.child(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directories for fixture");
        }
        fs::write(&path, content).expect("failed to write fixture file");
        path
    }
}

impl Drop for TestTempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

// ---------------------------------------------------------------------------
// Scripted surface
// ---------------------------------------------------------------------------

/// Surface double that records every primitive invoked, in call order.
///
/// Captures return a fixed frame; shell commands pop scripted results (or a
/// clean empty success when the script runs dry).
pub struct StubSurface {
    frame: CapturedFrame,
    invocations: StdMutex<Vec<String>>,
    exec_script: StdMutex<VecDeque<Result<CommandOutput, String>>>,
    capture_failure: StdMutex<Option<String>>,
}

impl StubSurface {
    pub fn new() -> Arc<Self> {
        Self::with_frame("c3R1Yi1mcmFtZQ==", 1280, 800)
    }

    pub fn with_frame(data: &str, width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            frame: CapturedFrame {
                data: data.to_string(),
                resolution: Resolution { width, height },
            },
            invocations: StdMutex::new(Vec::new()),
            exec_script: StdMutex::new(VecDeque::new()),
            capture_failure: StdMutex::new(None),
        })
    }

    /// Handle wrapping this stub, as the session sees it.
    pub fn handle(self: &Arc<Self>) -> SurfaceHandle {
        SurfaceHandle::new(Arc::clone(self))
    }

    /// Queue the result of the next `run_command` call.
    pub fn script_exec(&self, result: Result<CommandOutput, String>) {
        self.exec_script.lock().unwrap().push_back(result);
    }

    /// Make every subsequent capture fail with the given message.
    pub fn fail_captures(&self, message: &str) {
        *self.capture_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Primitive log, in invocation order.
    pub fn invoked(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }

    fn log(&self, entry: String) {
        self.invocations.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl SurfaceOps for StubSurface {
    fn summary(&self) -> String {
        "stub-surface".to_string()
    }

    async fn capture(&self) -> Result<CapturedFrame, SurfaceError> {
        self.log("capture".to_string());
        if let Some(message) = self.capture_failure.lock().unwrap().clone() {
            return Err(SurfaceError::Protocol(message));
        }
        Ok(self.frame.clone())
    }

    async fn move_pointer(&self, x: u32, y: u32) -> Result<(), SurfaceError> {
        self.log(format!("move_pointer:{x},{y}"));
        Ok(())
    }

    async fn click(&self, button: PointerButton) -> Result<(), SurfaceError> {
        self.log(format!("click:{button:?}").to_ascii_lowercase());
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), SurfaceError> {
        self.log(format!("type_text:{text}"));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), SurfaceError> {
        self.log(format!("press_key:{key}"));
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> Result<(), SurfaceError> {
        self.log(format!("scroll:{direction:?}:{amount}").to_ascii_lowercase());
        Ok(())
    }

    async fn drag(&self, from: (u32, u32), to: (u32, u32)) -> Result<(), SurfaceError> {
        self.log(format!("drag:{},{}->{},{}", from.0, from.1, to.0, to.1));
        Ok(())
    }

    async fn run_command(&self, command: &str) -> Result<CommandOutput, SurfaceError> {
        self.log(format!("run_command:{command}"));
        match self.exec_script.lock().unwrap().pop_front() {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(SurfaceError::Protocol(message)),
            None => Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
            }),
        }
    }

    async fn release(&self) -> Result<(), SurfaceError> {
        self.log("release".to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted generation client
// ---------------------------------------------------------------------------

/// Generation double: each `stream_turn` call pops the next scripted round
/// and replays its chunks. Rounds past the end of the script are empty,
/// which reads as a turn with no text and no tool calls.
pub struct ScriptedClient {
    rounds: StdMutex<VecDeque<Vec<Result<GenChunk, GenerationError>>>>,
    seen: StdMutex<Vec<Transcript>>,
}

impl ScriptedClient {
    pub fn new(rounds: Vec<Vec<Result<GenChunk, GenerationError>>>) -> Self {
        Self {
            rounds: StdMutex::new(rounds.into()),
            seen: StdMutex::new(Vec::new()),
        }
    }

    /// Transcripts passed to each round, in call order.
    pub fn seen_transcripts(&self) -> Vec<Transcript> {
        self.seen.lock().unwrap().clone()
    }

    /// How many rounds are still unplayed.
    pub fn remaining_rounds(&self) -> usize {
        self.rounds.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn stream_turn(
        &self,
        transcript: Transcript,
        _tools: Vec<ToolDeclaration>,
    ) -> Result<GenChunkReceiver, GenerationError> {
        self.seen.lock().unwrap().push(transcript);
        let round = self
            .rounds
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in round {
            let _ = tx.send(chunk);
        }
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_dir_fixture_writes_and_resolves_paths() {
        let fixture = TestTempDir::new("fixture");
        let file = fixture.write_text("nested/file.toml", "x = 1");
        assert_eq!(fs::read_to_string(file).unwrap(), "x = 1");
    }

    #[tokio::test]
    async fn stub_surface_records_primitives_in_order() {
        let stub = StubSurface::new();
        let handle = stub.handle();
        handle.move_pointer(10, 20).await.unwrap();
        handle.click(PointerButton::Left).await.unwrap();
        let frame = handle.capture().await.unwrap();
        assert_eq!(frame.resolution.width, 1280);
        assert_eq!(
            stub.invoked(),
            vec!["move_pointer:10,20", "click:left", "capture"]
        );
    }

    #[tokio::test]
    async fn stub_surface_plays_exec_script_then_defaults() {
        let stub = StubSurface::new();
        stub.script_exec(Ok(CommandOutput {
            stdout: "hi\n".into(),
            stderr: String::new(),
            exit_code: 0,
        }));
        let handle = stub.handle();
        let first = handle.run_command("echo hi").await.unwrap();
        assert_eq!(first.stdout, "hi\n");
        let second = handle.run_command("true").await.unwrap();
        assert_eq!(second.exit_code, 0);
    }

    #[tokio::test]
    async fn scripted_client_replays_rounds_and_captures_transcripts() {
        let client = ScriptedClient::new(vec![vec![
            Ok(GenChunk::text("hello")),
            Ok(GenChunk::call("bash", r#"{"command":"ls"}"#)),
        ]]);

        let mut rx = client
            .stream_turn(Transcript::new(), Vec::new())
            .await
            .unwrap();
        let mut texts = 0;
        let mut calls = 0;
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.unwrap();
            if chunk.text.is_some() {
                texts += 1;
            }
            if chunk.call.is_some() {
                calls += 1;
            }
        }
        assert_eq!((texts, calls), (1, 1));
        assert_eq!(client.seen_transcripts().len(), 1);
        assert_eq!(client.remaining_rounds(), 0);
    }
}
