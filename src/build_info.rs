//! Compile-time build metadata exposed to CLI/server surfaces.

/// Semver package version from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// VCS commit hash captured at build time.
pub const GIT_COMMIT: &str = env!("DESKPILOT_BUILD_GIT_HASH");

/// Build timestamp captured at compile time.
pub const BUILD_TIMESTAMP: &str = env!("DESKPILOT_BUILD_TIMESTAMP");

/// Help trailer block that surfaces build metadata in `deskpilot --help`.
pub const HELP_BUILD_METADATA: &str = concat!(
    "Build metadata:\n  commit: ",
    env!("DESKPILOT_BUILD_GIT_HASH"),
    "\n  built: ",
    env!("DESKPILOT_BUILD_TIMESTAMP")
);

/// Render concise startup metadata logged when `serve` boots.
pub fn startup_metadata_line() -> String {
    format!("v{VERSION} ({GIT_COMMIT}, built {BUILD_TIMESTAMP})")
}

/// Render CLI version block used by `deskpilot --version`.
pub fn cli_version_text() -> String {
    format!("deskpilot {VERSION}\ncommit: {GIT_COMMIT}\nbuilt: {BUILD_TIMESTAMP}")
}
