//! HTTP backend speaking JSON to a sandbox surface daemon.
//!
//! Endpoint layout, per sandbox:
//!   POST   {base}/v1/sandboxes/{id}/screenshot     -> {image, width, height}
//!   POST   {base}/v1/sandboxes/{id}/pointer/move   {x, y}
//!   POST   {base}/v1/sandboxes/{id}/pointer/click  {button}
//!   POST   {base}/v1/sandboxes/{id}/pointer/drag   {from, to}
//!   POST   {base}/v1/sandboxes/{id}/keyboard/type  {text}
//!   POST   {base}/v1/sandboxes/{id}/keyboard/key   {key}
//!   POST   {base}/v1/sandboxes/{id}/scroll         {direction, amount}
//!   POST   {base}/v1/sandboxes/{id}/exec           {command} -> {stdout, stderr, exit_code}
//!   DELETE {base}/v1/sandboxes/{id}/lease

use super::{CapturedFrame, CommandOutput, PointerButton, ScrollDirection, SurfaceOps};
use crate::config::SurfaceConfig;
use crate::error::SurfaceError;
use crate::types::Resolution;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Surface daemon client for one sandbox.
pub struct HttpSurface {
    http: reqwest::Client,
    base_url: String,
    sandbox_id: String,
    request_timeout: Duration,
    command_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ScreenshotBody {
    image: String,
    width: u32,
    height: u32,
}

impl HttpSurface {
    pub fn new(config: &SurfaceConfig, sandbox_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            sandbox_id: sandbox_id.into(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
        }
    }

    fn endpoint(&self, tail: &str) -> String {
        format!("{}/v1/sandboxes/{}/{tail}", self.base_url, self.sandbox_id)
    }

    /// POST one primitive and return the response body on 2xx.
    async fn post(
        &self,
        tail: &str,
        body: Value,
        timeout: Duration,
    ) -> Result<reqwest::Response, SurfaceError> {
        let response = self
            .http
            .post(self.endpoint(tail))
            .timeout(timeout)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SurfaceError::Status(status, body));
        }
        Ok(response)
    }

    /// POST a fire-and-acknowledge input primitive.
    async fn post_ack(&self, tail: &str, body: Value) -> Result<(), SurfaceError> {
        self.post(tail, body, self.request_timeout).await?;
        Ok(())
    }
}

#[async_trait]
impl SurfaceOps for HttpSurface {
    fn summary(&self) -> String {
        format!("sandbox {} via {}", self.sandbox_id, self.base_url)
    }

    async fn capture(&self) -> Result<CapturedFrame, SurfaceError> {
        let response = self
            .post("screenshot", json!({}), self.request_timeout)
            .await?;
        let body: ScreenshotBody = response
            .json()
            .await
            .map_err(|err| SurfaceError::Protocol(format!("screenshot body: {err}")))?;
        if body.image.is_empty() {
            return Err(SurfaceError::Protocol(
                "screenshot body carried an empty image".to_string(),
            ));
        }
        // The payload passes through to the provider verbatim; this is the
        // only place a bad frame can be caught.
        if let Err(err) = base64::engine::general_purpose::STANDARD.decode(body.image.as_bytes()) {
            return Err(SurfaceError::Protocol(format!(
                "screenshot payload is not base64: {err}"
            )));
        }
        Ok(CapturedFrame {
            data: body.image,
            resolution: Resolution {
                width: body.width,
                height: body.height,
            },
        })
    }

    async fn move_pointer(&self, x: u32, y: u32) -> Result<(), SurfaceError> {
        self.post_ack("pointer/move", json!({"x": x, "y": y})).await
    }

    async fn click(&self, button: PointerButton) -> Result<(), SurfaceError> {
        self.post_ack("pointer/click", json!({"button": button}))
            .await
    }

    async fn type_text(&self, text: &str) -> Result<(), SurfaceError> {
        self.post_ack("keyboard/type", json!({"text": text})).await
    }

    async fn press_key(&self, key: &str) -> Result<(), SurfaceError> {
        self.post_ack("keyboard/key", json!({"key": key})).await
    }

    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> Result<(), SurfaceError> {
        self.post_ack("scroll", json!({"direction": direction, "amount": amount}))
            .await
    }

    async fn drag(&self, from: (u32, u32), to: (u32, u32)) -> Result<(), SurfaceError> {
        self.post_ack(
            "pointer/drag",
            json!({
                "from": {"x": from.0, "y": from.1},
                "to": {"x": to.0, "y": to.1},
            }),
        )
        .await
    }

    async fn run_command(&self, command: &str) -> Result<CommandOutput, SurfaceError> {
        let response = self
            .post("exec", json!({"command": command}), self.command_timeout)
            .await?;
        response
            .json::<CommandOutput>()
            .await
            .map_err(|err| SurfaceError::Protocol(format!("exec body: {err}")))
    }

    async fn release(&self) -> Result<(), SurfaceError> {
        let response = self
            .http
            .delete(self.endpoint("lease"))
            .timeout(self.request_timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SurfaceError::Status(status, body));
        }
        Ok(())
    }
}
