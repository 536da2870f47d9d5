//! Unified error types for the orchestration service.

use std::fmt;

// ---------------------------------------------------------------------------
// ToolError
// ---------------------------------------------------------------------------

/// Errors from one tool invocation. These never end the session: the loop
/// folds them into the call's terminal outcome and moves on.
#[derive(Debug)]
pub enum ToolError {
    /// The model supplied arguments the tool couldn't interpret.
    InvalidArguments(String),
    /// The tool ran but encountered a failure.
    ExecutionFailed(String),
    /// The surface rejected or failed the underlying primitive.
    Surface(SurfaceError),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArguments(msg) => write!(f, "invalid arguments: {msg}"),
            Self::ExecutionFailed(msg) => write!(f, "execution failed: {msg}"),
            Self::Surface(e) => write!(f, "surface: {e}"),
        }
    }
}

impl std::error::Error for ToolError {}

impl From<SurfaceError> for ToolError {
    fn from(e: SurfaceError) -> Self {
        Self::Surface(e)
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// SurfaceError
// ---------------------------------------------------------------------------

/// Errors from the remote execution surface.
#[derive(Debug)]
pub enum SurfaceError {
    /// Network / reqwest-level error reaching the surface daemon.
    Http(reqwest::Error),
    /// Non-2xx status from the surface daemon.
    Status(u16, String),
    /// The requested sandbox is already leased to another session.
    Busy(String),
    /// The daemon answered with a payload the adapter could not interpret.
    Protocol(String),
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "surface http: {e}"),
            Self::Status(code, body) => write!(f, "surface status {code}: {body}"),
            Self::Busy(sandbox) => write!(f, "sandbox `{sandbox}` is already in use"),
            Self::Protocol(msg) => write!(f, "surface protocol: {msg}"),
        }
    }
}

impl std::error::Error for SurfaceError {}

impl From<reqwest::Error> for SurfaceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// GenerationError
// ---------------------------------------------------------------------------

/// Errors from the planning-model transport.
#[derive(Debug)]
pub enum GenerationError {
    /// Network / reqwest-level error.
    Http(reqwest::Error),
    /// Non-2xx status from the provider.
    Status(u16, String),
    /// The stream broke or produced frames the parser could not follow.
    Stream(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "generation http: {e}"),
            Self::Status(code, body) => write!(f, "generation status {code}: {body}"),
            Self::Stream(msg) => write!(f, "generation stream: {msg}"),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// SessionError (session-fatal)
// ---------------------------------------------------------------------------

/// Errors that end a session. Per-call tool failures are not represented
/// here; they fold into the transcript as error outcomes instead.
#[derive(Debug)]
pub enum SessionError {
    Generation(GenerationError),
    Surface(SurfaceError),
    /// The loop hit the configured round cap without the model going idle.
    RoundCapReached(usize),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generation(e) => write!(f, "generation: {e}"),
            Self::Surface(e) => write!(f, "surface: {e}"),
            Self::RoundCapReached(cap) => {
                write!(f, "session exceeded {cap} generation rounds without idling")
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl From<GenerationError> for SessionError {
    fn from(e: GenerationError) -> Self {
        Self::Generation(e)
    }
}

impl From<SurfaceError> for SessionError {
    fn from(e: SurfaceError) -> Self {
        Self::Surface(e)
    }
}
