//! Incremental SSE frame decoder for streaming completion bodies.
//!
//! The transport hands us arbitrary byte chunks that can split lines, events,
//! and even multi-byte characters. The decoder buffers undecoded bytes,
//! consumes complete lines (newlines are ASCII, so a line break never lands
//! inside a UTF-8 sequence), and yields each event's joined `data` payload
//! once the terminating blank line arrives. Comment lines (`:` prefix) and
//! non-`data` fields are dropped, matching the SSE framing rules.

/// Stateful SSE payload extractor.
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    pending_bytes: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk; returns every `data` payload it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending_bytes.extend_from_slice(chunk);
        let mut completed = Vec::new();

        while let Some(newline_at) = self.pending_bytes.iter().position(|b| *b == b'\n') {
            let line_bytes: Vec<u8> = self.pending_bytes.drain(..=newline_at).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim_end_matches(['\n', '\r']);
            self.consume_line(line, &mut completed);
        }
        completed
    }

    /// Flush a trailing unterminated event at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending_bytes.is_empty() {
            let tail: Vec<u8> = std::mem::take(&mut self.pending_bytes);
            let line = String::from_utf8_lossy(&tail).to_string();
            let mut ignored = Vec::new();
            self.consume_line(line.trim_end_matches('\r'), &mut ignored);
        }
        if self.data_lines.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data_lines).join("\n"))
    }

    fn consume_line(&mut self, line: &str, completed: &mut Vec<String>) {
        if line.is_empty() {
            if !self.data_lines.is_empty() {
                completed.push(std::mem::take(&mut self.data_lines).join("\n"));
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data_lines.push(value.to_string());
        }
    }
}
