//! Scripted local backends for end-to-end streaming tests.
//!
//! Both stand-ins follow the same shape: a listener on an OS-assigned port
//! and a service thread answering scripted responses over plain HTTP/1.1
//! with `Connection: close`. Requests are recorded so tests can assert
//! exactly what the server under test sent.

use deskpilot::config::{Config, GenerationConfig, ServerConfig, SessionConfig, SurfaceConfig};
use deskpilot::server::{router, AppState};
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Convenience result alias for harness operations.
pub type HarnessResult<T> = Result<T, String>;

/// Base64 payload served for every scripted screenshot.
pub const FRAME_B64: &str = "ZGVtby1mcmFtZQ==";

// ---------------------------------------------------------------------------
// Scripted planning-model server
// ---------------------------------------------------------------------------

/// Local provider stand-in that answers each generation request with a
/// canned SSE body, repeating the last one when the script runs out.
pub struct ScriptedModelServer {
    address: String,
    shutdown: Arc<AtomicBool>,
    seen: Arc<Mutex<Vec<Value>>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ScriptedModelServer {
    pub fn start(rounds: Vec<String>) -> HarnessResult<Self> {
        let (listener, address) = bind_scripted_listener()?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let shutdown_flag = Arc::clone(&shutdown);
        let seen_log = Arc::clone(&seen);
        let thread = thread::spawn(move || {
            while !shutdown_flag.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let Ok(request) = read_http_request(&mut stream) else {
                            continue;
                        };
                        let index = {
                            let mut log = lock(&seen_log);
                            log.push(request.body);
                            log.len() - 1
                        };
                        let body = rounds
                            .get(index)
                            .or_else(|| rounds.last())
                            .cloned()
                            .unwrap_or_default();
                        let _ = write_http_response(
                            &mut stream,
                            200,
                            "OK",
                            "text/event-stream",
                            &body,
                        );
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(_) => thread::sleep(Duration::from_millis(10)),
                }
            }
        });

        Ok(Self {
            address,
            shutdown,
            seen,
            thread: Some(thread),
        })
    }

    pub fn base_url(&self) -> String {
        self.address.clone()
    }

    /// Request payloads seen so far, in arrival order.
    pub fn seen_requests(&self) -> Vec<Value> {
        lock(&self.seen).clone()
    }
}

impl Drop for ScriptedModelServer {
    fn drop(&mut self) {
        stop_scripted_thread(&self.address, &self.shutdown, &mut self.thread);
    }
}

// ---------------------------------------------------------------------------
// Scripted sandbox surface daemon
// ---------------------------------------------------------------------------

/// Local daemon stand-in: screenshots always answer [`FRAME_B64`], exec
/// walks the scripted status/body sequence, and every other primitive acks
/// with an empty object.
pub struct ScriptedSurfaceDaemon {
    address: String,
    shutdown: Arc<AtomicBool>,
    hits: Arc<Mutex<Vec<String>>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ScriptedSurfaceDaemon {
    pub fn start(exec_responses: Vec<(u16, String)>) -> HarnessResult<Self> {
        let (listener, address) = bind_scripted_listener()?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let hits = Arc::new(Mutex::new(Vec::new()));

        let shutdown_flag = Arc::clone(&shutdown);
        let hit_log = Arc::clone(&hits);
        let thread = thread::spawn(move || {
            let mut exec_seen = 0usize;
            while !shutdown_flag.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let Ok(request) = read_http_request(&mut stream) else {
                            continue;
                        };
                        let tail = primitive_tail(&request.path);
                        lock(&hit_log).push(tail.clone());
                        match tail.as_str() {
                            "screenshot" => {
                                let frame =
                                    json!({"image": FRAME_B64, "width": 1280, "height": 800});
                                let _ = write_http_response(
                                    &mut stream,
                                    200,
                                    "OK",
                                    "application/json",
                                    &frame.to_string(),
                                );
                            }
                            "exec" => {
                                let (status, body) = exec_responses
                                    .get(exec_seen)
                                    .or_else(|| exec_responses.last())
                                    .cloned()
                                    .unwrap_or((500, "unscripted exec".to_string()));
                                exec_seen += 1;
                                let _ = write_http_response(
                                    &mut stream,
                                    status,
                                    reason_for(status),
                                    "application/json",
                                    &body,
                                );
                            }
                            _ => {
                                let _ = write_http_response(
                                    &mut stream,
                                    200,
                                    "OK",
                                    "application/json",
                                    "{}",
                                );
                            }
                        }
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(_) => thread::sleep(Duration::from_millis(10)),
                }
            }
        });

        Ok(Self {
            address,
            shutdown,
            hits,
            thread: Some(thread),
        })
    }

    pub fn base_url(&self) -> String {
        self.address.clone()
    }

    /// Primitive paths hit so far, e.g. `["screenshot", "exec", "lease"]`.
    pub fn hits(&self) -> Vec<String> {
        lock(&self.hits).clone()
    }
}

impl Drop for ScriptedSurfaceDaemon {
    fn drop(&mut self) {
        stop_scripted_thread(&self.address, &self.shutdown, &mut self.thread);
    }
}

/// Strip `/v1/sandboxes/{id}/` from a daemon path, leaving the primitive.
fn primitive_tail(path: &str) -> String {
    path.strip_prefix("/v1/sandboxes/")
        .and_then(|rest| rest.split_once('/'))
        .map(|(_, tail)| tail.to_string())
        .unwrap_or_else(|| path.to_string())
}

fn reason_for(status: u16) -> &'static str {
    match status {
        200 => "OK",
        500 => "Internal Server Error",
        _ => "Error",
    }
}

// ---------------------------------------------------------------------------
// Server under test
// ---------------------------------------------------------------------------

/// Config wiring the server under test to the scripted backends.
pub fn scripted_config(model_url: &str, daemon_url: &str) -> Config {
    Config {
        server: ServerConfig {
            listen_addr: "127.0.0.1:0".into(),
        },
        generation: GenerationConfig {
            base_url: model_url.into(),
            api_key: "test-key".into(),
            api_key_env: None,
            model: "planner-1".into(),
            system_prompt: "You control a computer.".into(),
            temperature: None,
            connect_timeout_secs: 5,
        },
        surface: SurfaceConfig {
            base_url: daemon_url.into(),
            request_timeout_secs: 5,
            command_timeout_secs: 5,
        },
        session: SessionConfig {
            max_rounds: 8,
            settle_delay_ms: 0,
            continuation_prompt: "Continue with the task.".into(),
        },
    }
}

/// Spawn the real service on an ephemeral port and return its base URL.
pub async fn spawn_deskpilot(config: Config) -> HarnessResult<String> {
    let app = router(AppState::new(config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| format!("failed binding server under test: {e}"))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("failed reading server addr: {e}"))?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

// ---------------------------------------------------------------------------
// SSE script builders
// ---------------------------------------------------------------------------

/// One provider SSE frame.
pub fn sse_frame(payload: &Value) -> String {
    format!("data: {payload}\n\n")
}

/// Frame carrying one assistant text delta.
pub fn sse_text_delta(text: &str) -> String {
    sse_frame(&json!({"choices": [{"delta": {"content": text}}]}))
}

/// Frames announcing one complete tool call: name first, then arguments.
pub fn sse_tool_call(index: u64, name: &str, arguments: &str) -> String {
    let name_frame = sse_frame(&json!({
        "choices": [{"delta": {"tool_calls": [{"index": index, "function": {"name": name}}]}}]
    }));
    let args_frame = sse_frame(&json!({
        "choices": [{"delta": {"tool_calls": [{"index": index, "function": {"arguments": arguments}}]}}]
    }));
    format!("{name_frame}{args_frame}")
}

/// Full SSE body for one generation round.
pub fn sse_round(pieces: &[String]) -> String {
    let mut body = pieces.concat();
    body.push_str("data: [DONE]\n\n");
    body
}

// ---------------------------------------------------------------------------
// Plain HTTP/1.1 plumbing
// ---------------------------------------------------------------------------

/// One parsed request seen by a scripted server.
struct ParsedRequest {
    path: String,
    body: Value,
}

fn bind_scripted_listener() -> HarnessResult<(TcpListener, String)> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|e| format!("failed binding scripted server: {e}"))?;
    listener
        .set_nonblocking(true)
        .map_err(|e| format!("failed setting nonblocking listener: {e}"))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("failed reading listener addr: {e}"))?;
    Ok((listener, format!("http://{addr}")))
}

fn stop_scripted_thread(
    address: &str,
    shutdown: &AtomicBool,
    thread: &mut Option<thread::JoinHandle<()>>,
) {
    shutdown.store(true, Ordering::Relaxed);
    if let Some(host) = address.strip_prefix("http://") {
        let _ = TcpStream::connect(host).and_then(|s| s.shutdown(Shutdown::Both));
    }
    if let Some(join) = thread.take() {
        let _ = join.join();
    }
}

fn read_http_request(stream: &mut TcpStream) -> HarnessResult<ParsedRequest> {
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .map_err(|e| format!("failed setting read timeout: {e}"))?;
    let mut buffer = Vec::<u8>::new();
    let mut temp = [0u8; 2048];
    let mut header_end: Option<usize> = None;
    let mut content_length = 0usize;

    loop {
        let n = stream
            .read(&mut temp)
            .map_err(|e| format!("failed reading request bytes: {e}"))?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&temp[..n]);
        if header_end.is_none() {
            if let Some(idx) = find_header_terminator(&buffer) {
                header_end = Some(idx);
                let head = String::from_utf8_lossy(&buffer[..idx]).to_string();
                content_length = parse_content_length(&head).unwrap_or(0);
            }
        }
        if let Some(idx) = header_end {
            if buffer.len().saturating_sub(idx + 4) >= content_length {
                break;
            }
        }
    }

    let idx =
        header_end.ok_or_else(|| "malformed HTTP request (missing header end)".to_string())?;
    let head = String::from_utf8_lossy(&buffer[..idx]).to_string();
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("")
        .to_string();
    let body_bytes = &buffer[idx + 4..];
    let body = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body_bytes)
            .map_err(|e| format!("failed parsing request json: {e}"))?
    };
    Ok(ParsedRequest { path, body })
}

fn find_header_terminator(bytes: &[u8]) -> Option<usize> {
    bytes.windows(4).position(|window| window == b"\r\n\r\n")
}

fn parse_content_length(headers: &str) -> Option<usize> {
    headers.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.eq_ignore_ascii_case("content-length") {
            value.trim().parse::<usize>().ok()
        } else {
            None
        }
    })
}

fn write_http_response(
    stream: &mut TcpStream,
    status: u16,
    reason: &str,
    content_type: &str,
    body: &str,
) -> HarnessResult<()> {
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n{body}",
        len = body.len(),
    );
    stream
        .write_all(response.as_bytes())
        .map_err(|e| format!("failed writing response bytes: {e}"))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
