//! Default configuration constants.
//!
//! Keeping defaults in one module makes behavior-preserving refactors safer:
//! callers can share the same constants without duplicating literals.

/// Embedded default `deskpilot.toml` template written by `deskpilot init`.
pub(super) const DESKPILOT_CONFIG_TEMPLATE: &str = include_str!("../templates/deskpilot.toml");
/// Environment variable naming an explicit config file path.
pub(super) const CONFIG_PATH_ENV: &str = "DESKPILOT_CONFIG";
/// Default bind address for the streaming session endpoint.
pub(super) const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8642";
/// Default OpenAI-compatible provider base URL.
pub(super) const DEFAULT_GENERATION_BASE_URL: &str = "https://api.openai.com/v1";
/// Default provider model ID.
pub(super) const DEFAULT_MODEL_ID: &str = "gpt-5.3";
/// Environment variable consulted for the provider key when none is configured.
pub(super) const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Default TCP connect timeout toward the provider.
pub(super) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
/// Default sandbox daemon base URL.
pub(super) const DEFAULT_SURFACE_BASE_URL: &str = "http://127.0.0.1:8700";
/// Default timeout for pointer/keyboard/screenshot requests.
pub(super) const DEFAULT_SURFACE_REQUEST_TIMEOUT_SECS: u64 = 15;
/// Default timeout for shell executions on the sandbox.
pub(super) const DEFAULT_SURFACE_COMMAND_TIMEOUT_SECS: u64 = 120;
/// Default safety cap on generation rounds per session.
pub(super) const DEFAULT_MAX_ROUNDS: usize = 16;
/// Default grace period between batch completion and the settle capture.
pub(super) const DEFAULT_SETTLE_DELAY_MS: u64 = 0;

/// Built-in system prompt for the computer-driving agent.
pub(super) const DEFAULT_SYSTEM_PROMPT: &str = "\
You are operating a remote computer on the user's behalf. You can see the \
screen through screenshots, control the mouse and keyboard with the \
`computer` tool, and run shell commands with the `bash` tool. Take a \
screenshot before your first interaction so you know what is on screen, \
work in small steps, and verify the effect of each step on the following \
screenshot before moving on.";

/// Synthetic prompt appended with each settle screenshot.
pub(super) const DEFAULT_CONTINUATION_PROMPT: &str = "\
Here is the current state of the screen after your actions. Continue \
working on the task, or summarize the outcome if it is complete.";
