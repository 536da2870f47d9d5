//! Deskpilot, a streaming orchestrator for screen-driving agent sessions.
//!
//! The server sits between a planning model and a sandboxed desktop. Each
//! `POST /v1/turns` request runs one session: the model plans, tool calls are
//! dispatched against the sandbox surface as they stream in, and everything
//! the client needs to render the conversation is pushed back as a typed
//! event stream, one JSON object per line.
//!
//! # Quick start
//!
//! ```no_run
//! use deskpilot::config::load_config;
//! use deskpilot::server::run_server;
//!
//! # async fn example() {
//! let config = load_config(None).unwrap();
//! run_server(config).await.unwrap();
//! # }
//! ```

pub mod build_info;
pub mod config;
pub mod error;
pub mod generate;
pub mod protocol;
pub mod server;
pub mod session;
pub mod surface;
#[cfg(test)]
pub mod testsupport;
pub mod textutil;
pub mod tools;
pub mod types;
pub mod view;
