//! Configuration data model.
//!
//! This module intentionally holds struct definitions plus default values.
//! Loader and source-precedence logic stays in `config::mod` so parsing
//! behavior remains centralized.

use serde::Deserialize;

use super::defaults::{
    DEFAULT_API_KEY_ENV, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_CONTINUATION_PROMPT,
    DEFAULT_GENERATION_BASE_URL, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_ROUNDS, DEFAULT_MODEL_ID,
    DEFAULT_SETTLE_DELAY_MS, DEFAULT_SURFACE_BASE_URL, DEFAULT_SURFACE_COMMAND_TIMEOUT_SECS,
    DEFAULT_SURFACE_REQUEST_TIMEOUT_SECS, DEFAULT_SYSTEM_PROMPT,
};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub generation: GenerationConfig,
    pub surface: SurfaceConfig,
    pub session: SessionConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the streaming session endpoint binds to.
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.into(),
        }
    }
}

/// Planning-model provider settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// OpenAI-compatible provider base URL.
    pub base_url: String,
    /// Literal API key; resolved from `api_key_env` at load time when empty.
    pub api_key: String,
    /// Environment variable consulted when `api_key` is empty.
    pub api_key_env: Option<String>,
    pub model: String,
    pub system_prompt: String,
    pub temperature: Option<f64>,
    pub connect_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GENERATION_BASE_URL.into(),
            api_key: String::new(),
            api_key_env: Some(DEFAULT_API_KEY_ENV.into()),
            model: DEFAULT_MODEL_ID.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            temperature: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Sandbox daemon connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Daemon exposing screen/pointer/keyboard/exec primitives.
    pub base_url: String,
    /// Timeout for pointer, keyboard, and screenshot requests.
    pub request_timeout_secs: u64,
    /// Timeout for shell executions, which can legitimately run long.
    pub command_timeout_secs: u64,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SURFACE_BASE_URL.into(),
            request_timeout_secs: DEFAULT_SURFACE_REQUEST_TIMEOUT_SECS,
            command_timeout_secs: DEFAULT_SURFACE_COMMAND_TIMEOUT_SECS,
        }
    }
}

/// Session loop policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Safety cap on generation rounds per session.
    pub max_rounds: usize,
    /// Grace period in milliseconds between a batch finishing and the settle
    /// capture.
    pub settle_delay_ms: u64,
    /// Synthetic prompt appended with each settle screenshot.
    pub continuation_prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            continuation_prompt: DEFAULT_CONTINUATION_PROMPT.into(),
        }
    }
}

/// Result of explicit global config initialization (`deskpilot init`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalConfigInitResult {
    Created {
        path: std::path::PathBuf,
    },
    AlreadyInitialized {
        path: std::path::PathBuf,
    },
    Overwritten {
        path: std::path::PathBuf,
        backup_path: std::path::PathBuf,
    },
}
