//! GUI-control tool.
//!
//! Exposes the surface's pointer, keyboard, and screen primitives behind a
//! single `computer` tool with a tagged `action` argument. The first
//! invocation of a session must be a `screenshot` action; the session
//! enforces that through [`SessionTool::first_use_gate`] before dispatch, so
//! the agent always sees the screen before it starts acting on it.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::SessionTool;
use crate::error::ToolError;
use crate::surface::{PointerButton, ScrollDirection, SurfaceHandle};
use crate::types::{ToolDeclaration, ToolOutcome};

/// Default scroll amount in wheel notches.
const DEFAULT_SCROLL_AMOUNT: u32 = 3;

/// Tool that drives the remote screen, pointer, and keyboard.
pub struct ComputerTool;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ComputerAction {
    Screenshot,
    MoveMouse {
        x: u32,
        y: u32,
    },
    Click {
        x: Option<u32>,
        y: Option<u32>,
        button: Option<PointerButton>,
    },
    #[serde(rename = "type")]
    TypeText {
        text: String,
    },
    Key {
        key: String,
    },
    Scroll {
        direction: ScrollDirection,
        amount: Option<u32>,
    },
    Drag {
        from_x: u32,
        from_y: u32,
        to_x: u32,
        to_y: u32,
    },
}

/// Whether a parsed input object names the screen-capture action.
pub fn is_screenshot_action(input: &Value) -> bool {
    input.get("action").and_then(Value::as_str) == Some("screenshot")
}

/// Refusal text used when a non-capture action arrives before the agent has
/// ever seen the screen.
pub fn orientation_required_text() -> String {
    "The first `computer` invocation of a session must use action `screenshot`. \
     Take a screenshot to observe the current screen, then retry this action."
        .to_string()
}

#[async_trait]
impl SessionTool for ComputerTool {
    fn name(&self) -> &'static str {
        "computer"
    }

    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().into(),
            description:
                "Control the remote desktop: take screenshots, move the mouse, click, type, press keys, scroll, and drag. Coordinates are pixels with the origin at the top-left of the screen. Your first invocation in a session must be `screenshot` so you can see the screen before acting.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["screenshot", "move_mouse", "click", "type", "key", "scroll", "drag"],
                        "description": "Which primitive to perform"
                    },
                    "x": { "type": "integer", "minimum": 0, "description": "X pixel coordinate (move_mouse, optionally click)" },
                    "y": { "type": "integer", "minimum": 0, "description": "Y pixel coordinate (move_mouse, optionally click)" },
                    "button": {
                        "type": "string",
                        "enum": ["left", "right", "middle"],
                        "description": "Mouse button for click; defaults to left"
                    },
                    "text": { "type": "string", "description": "Text to type (type action)" },
                    "key": { "type": "string", "description": "Key or chord to press, e.g. 'Return', 'ctrl+c' (key action)" },
                    "direction": {
                        "type": "string",
                        "enum": ["up", "down", "left", "right"],
                        "description": "Scroll direction (scroll action)"
                    },
                    "amount": { "type": "integer", "minimum": 1, "description": "Scroll amount in wheel notches; defaults to 3" },
                    "from_x": { "type": "integer", "minimum": 0, "description": "Drag start X (drag action)" },
                    "from_y": { "type": "integer", "minimum": 0, "description": "Drag start Y (drag action)" },
                    "to_x": { "type": "integer", "minimum": 0, "description": "Drag end X (drag action)" },
                    "to_y": { "type": "integer", "minimum": 0, "description": "Drag end Y (drag action)" }
                },
                "required": ["action"]
            }),
        }
    }

    fn first_use_gate(&self, input: &Value) -> Option<String> {
        if is_screenshot_action(input) {
            None
        } else {
            Some(orientation_required_text())
        }
    }

    async fn execute(
        &self,
        surface: &SurfaceHandle,
        input: &Value,
    ) -> Result<ToolOutcome, ToolError> {
        let action: ComputerAction = serde_json::from_value(input.clone())
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        match action {
            ComputerAction::Screenshot => {
                let frame = surface.capture().await?;
                Ok(ToolOutcome::image(frame.data, Some(frame.resolution)))
            }
            ComputerAction::MoveMouse { x, y } => {
                surface.move_pointer(x, y).await?;
                Ok(ToolOutcome::text(format!("moved pointer to ({x}, {y})")))
            }
            ComputerAction::Click { x, y, button } => {
                if let (Some(x), Some(y)) = (x, y) {
                    surface.move_pointer(x, y).await?;
                }
                let button = button.unwrap_or(PointerButton::Left);
                surface.click(button).await?;
                Ok(ToolOutcome::text(format!("clicked {button:?} button").to_ascii_lowercase()))
            }
            ComputerAction::TypeText { text } => {
                surface.type_text(&text).await?;
                Ok(ToolOutcome::text(format!(
                    "typed {} characters",
                    text.chars().count()
                )))
            }
            ComputerAction::Key { key } => {
                surface.press_key(&key).await?;
                Ok(ToolOutcome::text(format!("pressed {key}")))
            }
            ComputerAction::Scroll { direction, amount } => {
                let amount = amount.unwrap_or(DEFAULT_SCROLL_AMOUNT);
                surface.scroll(direction, amount).await?;
                Ok(ToolOutcome::text(
                    format!("scrolled {direction:?} by {amount}").to_ascii_lowercase(),
                ))
            }
            ComputerAction::Drag {
                from_x,
                from_y,
                to_x,
                to_y,
            } => {
                surface.drag((from_x, from_y), (to_x, to_y)).await?;
                Ok(ToolOutcome::text(format!(
                    "dragged from ({from_x}, {from_y}) to ({to_x}, {to_y})"
                )))
            }
        }
    }
}
