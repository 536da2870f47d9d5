//! Pluggable tool system.
//!
//! Tools are async trait objects the model can invoke during a generation
//! round. Each tool provides its own function declaration and an async
//! execute method that runs against the session's leased surface. Failures
//! stay scoped to the one call; the surrounding batch is never aborted.

pub mod computer;
pub mod shell;

use crate::error::ToolError;
use crate::surface::SurfaceHandle;
use crate::types::{ToolDeclaration, ToolOutcome};
use async_trait::async_trait;
use serde_json::Value;

pub use computer::ComputerTool;
pub use shell::BashTool;

// ---------------------------------------------------------------------------
// Tool trait
// ---------------------------------------------------------------------------

/// A tool that can be invoked by the planning model.
///
/// Implement this trait to add custom tools. Register instances with
/// [`ToolCatalog`] before starting the session.
#[async_trait]
pub trait SessionTool: Send + Sync {
    /// Unique name matching what the model will call.
    fn name(&self) -> &'static str;

    /// Provider-agnostic declaration sent with every generation request.
    fn declaration(&self) -> ToolDeclaration;

    /// Gate consulted until this tool's first dispatched invocation of the
    /// session. Returns the refusal text when the call must be blocked
    /// without touching the surface.
    fn first_use_gate(&self, input: &Value) -> Option<String> {
        let _ = input;
        None
    }

    /// Execute with final parsed arguments against the leased surface.
    async fn execute(
        &self,
        surface: &SurfaceHandle,
        input: &Value,
    ) -> Result<ToolOutcome, ToolError>;
}

// ---------------------------------------------------------------------------
// Tool catalog
// ---------------------------------------------------------------------------

/// The set of tools published to the model for one session.
///
/// The session sends all registered declarations with each generation request
/// and dispatches discovered calls through this catalog.
pub struct ToolCatalog {
    tools: Vec<Box<dyn SessionTool>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Catalog holding the built-in GUI-control and shell tools.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(ComputerTool);
        catalog.register(BashTool);
        catalog
    }

    /// Register a tool.
    pub fn register(&mut self, tool: impl SessionTool + 'static) {
        self.tools.push(Box::new(tool));
    }

    /// Declarations for the generation request.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.iter().map(|t| t.declaration()).collect()
    }

    /// First-use gate for `name`, if the tool defines one. Unknown names gate
    /// nothing; they fail later at dispatch.
    pub fn first_use_gate(&self, name: &str, input: &Value) -> Option<String> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .and_then(|t| t.first_use_gate(input))
    }

    /// Find a tool by name and execute it against the surface.
    pub async fn execute(
        &self,
        name: &str,
        surface: &SurfaceHandle,
        input: &Value,
    ) -> Result<ToolOutcome, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ToolError::ExecutionFailed(format!("unknown tool: {name}")))?;
        tool.execute(surface, input).await
    }

    /// True if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::StubSurface;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl SessionTool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn declaration(&self) -> ToolDeclaration {
            ToolDeclaration {
                name: "echo".into(),
                description: "echoes arguments back".into(),
                parameters: json!({}),
            }
        }
        async fn execute(
            &self,
            _surface: &SurfaceHandle,
            input: &Value,
        ) -> Result<ToolOutcome, ToolError> {
            Ok(ToolOutcome::text(input.to_string()))
        }
    }

    #[test]
    fn new_catalog_is_empty() {
        assert!(ToolCatalog::new().is_empty());
    }

    #[test]
    fn builtin_catalog_declares_computer_and_bash() {
        let names: Vec<String> = ToolCatalog::builtin()
            .declarations()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["computer", "bash"]);
    }

    #[test]
    fn gate_defaults_to_open_for_tools_without_one() {
        let mut catalog = ToolCatalog::new();
        catalog.register(EchoTool);
        assert!(catalog.first_use_gate("echo", &json!({})).is_none());
        assert!(catalog.first_use_gate("no-such-tool", &json!({})).is_none());
    }

    #[tokio::test]
    async fn execute_known_tool_returns_outcome() {
        let mut catalog = ToolCatalog::new();
        catalog.register(EchoTool);
        let stub = StubSurface::new();
        let outcome = catalog
            .execute("echo", &stub.handle(), &json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(outcome, ToolOutcome::text(r#"{"x":1}"#));
    }

    #[tokio::test]
    async fn execute_unknown_tool_returns_error() {
        let catalog = ToolCatalog::new();
        let stub = StubSurface::new();
        let err = catalog
            .execute("nonexistent", &stub.handle(), &json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }
}
