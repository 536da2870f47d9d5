//! HTTP surface of the orchestration service.
//!
//! One route does the real work: `POST /v1/turns` takes the prior transcript
//! plus a sandbox id and answers with the session's event stream, one JSON
//! event per line. The response stays open until the session goes idle or
//! fails. The driver runs in its own task, so a client that disconnects
//! mid-stream never wedges the loop; the sink notices and the session winds
//! down on its own.

use crate::config::Config;
use crate::error::SurfaceError;
use crate::generate::HttpGenerationClient;
use crate::protocol::{encode_event_line, EventSink, StreamEvent};
use crate::session::Session;
use crate::surface::SurfacePool;
use crate::tools::ToolCatalog;
use crate::types::Transcript;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

/// Shared state behind the router.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pool: Arc<SurfacePool>,
    catalog: Arc<ToolCatalog>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let pool = Arc::new(SurfacePool::new(config.surface.clone()));
        Self {
            config: Arc::new(config),
            pool,
            catalog: Arc::new(ToolCatalog::builtin()),
        }
    }
}

/// Request body of `POST /v1/turns`.
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    /// Sandbox whose surface this session drives.
    pub sandbox_id: String,
    /// Full prior conversation, ending with the newest human turn.
    #[serde(default)]
    pub transcript: Transcript,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/turns", post(run_turn))
        .with_state(state)
}

/// Bind the configured address and serve until the process stops.
pub async fn run_server(config: Config) -> Result<(), std::io::Error> {
    let addr = config.server.listen_addr.clone();
    let app = router(AppState::new(config));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, build = %crate::build_info::startup_metadata_line(), "listening");
    axum::serve(listener, app).await
}

async fn healthz() -> &'static str {
    "ok"
}

async fn run_turn(State(state): State<AppState>, Json(request): Json<TurnRequest>) -> Response {
    let client = match HttpGenerationClient::new(&state.config.generation) {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(error = %err, "generation client construction failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
        }
    };
    let lease = match state.pool.acquire(&request.sandbox_id) {
        Ok(lease) => lease,
        Err(err @ SurfaceError::Busy(_)) => {
            tracing::warn!(sandbox = %request.sandbox_id, "turn rejected: sandbox busy");
            return (StatusCode::CONFLICT, err.to_string()).into_response();
        }
        Err(err) => {
            tracing::error!(error = %err, "sandbox lease failed");
            return (StatusCode::BAD_GATEWAY, err.to_string()).into_response();
        }
    };

    let (sink, rx) = EventSink::channel();
    let session = Session::new(
        Box::new(client),
        Arc::clone(&state.catalog),
        lease,
        state.config.session.clone(),
        sink,
        request.transcript,
    );
    tokio::spawn(async move {
        let report = session.run().await;
        tracing::info!(phase = ?report.phase, rounds = report.rounds, "session finished");
    });

    let lines = UnboundedReceiverStream::new(rx).map(event_to_line);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response()
}

fn event_to_line(event: StreamEvent) -> Result<String, serde_json::Error> {
    encode_event_line(&event).map(|mut line| {
        line.push('\n');
        line
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
