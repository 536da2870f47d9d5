//! Remote execution surface seam.
//!
//! The surface is the sandboxed desktop a session drives: screen capture,
//! pointer/keyboard input, and shell execution. [`SurfaceOps`] decouples the
//! session loop from the concrete transport; [`SurfaceHandle`] is the
//! cloneable wrapper tool executions share within a batch. Primitive calls
//! carry no internal locking: concurrent calls within a batch may interleave
//! on the remote surface, which is why only the post-batch capture is treated
//! as a reliable readout.

use crate::error::SurfaceError;
use crate::types::Resolution;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod http;
mod pool;

pub use http::HttpSurface;
pub use pool::{SurfaceLease, SurfacePool};

/// Pointer button for click actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

/// Scroll wheel direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// One captured screen frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Base64 image payload.
    pub data: String,
    pub resolution: Resolution,
}

/// Output of one shell command run on the surface.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Primitive operations of the remote surface.
///
/// Every call may fail independently; callers decide whether a failure is
/// per-call (tool outcome) or session-fatal (first orientation capture).
#[async_trait]
pub trait SurfaceOps: Send + Sync {
    /// Human-readable target summary for logs.
    fn summary(&self) -> String;
    async fn capture(&self) -> Result<CapturedFrame, SurfaceError>;
    async fn move_pointer(&self, x: u32, y: u32) -> Result<(), SurfaceError>;
    async fn click(&self, button: PointerButton) -> Result<(), SurfaceError>;
    async fn type_text(&self, text: &str) -> Result<(), SurfaceError>;
    async fn press_key(&self, key: &str) -> Result<(), SurfaceError>;
    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> Result<(), SurfaceError>;
    async fn drag(&self, from: (u32, u32), to: (u32, u32)) -> Result<(), SurfaceError>;
    async fn run_command(&self, command: &str) -> Result<CommandOutput, SurfaceError>;
    /// Tear down the remote lease; the handle must not be used afterwards.
    async fn release(&self) -> Result<(), SurfaceError>;
}

/// Shared handle to one leased surface.
#[derive(Clone)]
pub struct SurfaceHandle {
    inner: Arc<dyn SurfaceOps>,
}

impl SurfaceHandle {
    pub fn new(inner: Arc<dyn SurfaceOps>) -> Self {
        Self { inner }
    }

    pub fn summary(&self) -> String {
        self.inner.summary()
    }

    pub async fn capture(&self) -> Result<CapturedFrame, SurfaceError> {
        self.inner.capture().await
    }

    pub async fn move_pointer(&self, x: u32, y: u32) -> Result<(), SurfaceError> {
        self.inner.move_pointer(x, y).await
    }

    pub async fn click(&self, button: PointerButton) -> Result<(), SurfaceError> {
        self.inner.click(button).await
    }

    pub async fn type_text(&self, text: &str) -> Result<(), SurfaceError> {
        self.inner.type_text(text).await
    }

    pub async fn press_key(&self, key: &str) -> Result<(), SurfaceError> {
        self.inner.press_key(key).await
    }

    pub async fn scroll(
        &self,
        direction: ScrollDirection,
        amount: u32,
    ) -> Result<(), SurfaceError> {
        self.inner.scroll(direction, amount).await
    }

    pub async fn drag(&self, from: (u32, u32), to: (u32, u32)) -> Result<(), SurfaceError> {
        self.inner.drag(from, to).await
    }

    pub async fn run_command(&self, command: &str) -> Result<CommandOutput, SurfaceError> {
        self.inner.run_command(command).await
    }

    pub async fn release(&self) -> Result<(), SurfaceError> {
        self.inner.release().await
    }
}

impl std::fmt::Debug for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceHandle")
            .field("target", &self.inner.summary())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_and_direction_args_use_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_value(PointerButton::Left).unwrap(),
            serde_json::json!("left")
        );
        let direction: ScrollDirection = serde_json::from_value(serde_json::json!("down")).unwrap();
        assert_eq!(direction, ScrollDirection::Down);
    }
}
