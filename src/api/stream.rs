use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use super::types::{ApiError, Frame, StreamEvent};
use crate::models::{ChartPayload, Evidence, TablePayload};

const DATA_PREFIX: &str = "data:";

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Parse a single stream line. Returns `None` for anything that is not a
/// well-formed, recognized frame.
pub fn parse_frame(line: &str) -> Option<Frame> {
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == "[DONE]" {
        return Some(Frame::Done);
    }

    let raw: RawFrame = match serde_json::from_str(payload) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("Skipping malformed frame: {}", e);
            return None;
        }
    };

    let frame = match raw.kind.as_str() {
        "text" => raw.data.as_str().map(|s| Frame::Text(s.to_string())),
        "table" => serde_json::from_value::<TablePayload>(raw.data)
            .ok()
            .map(Frame::Table),
        "chart" => serde_json::from_value::<ChartPayload>(raw.data)
            .ok()
            .map(Frame::Chart),
        "evidence" => parse_evidence(raw.data).map(Frame::Evidence),
        "thinking" => Some(Frame::Thinking(raw.data.as_str().map(str::to_string))),
        "error" => Some(Frame::Error(
            raw.data.as_str().unwrap_or("Server error").to_string(),
        )),
        "done" => Some(Frame::Done),
        other => {
            tracing::debug!("Skipping frame of unknown type {:?}", other);
            return None;
        }
    };

    if frame.is_none() {
        tracing::warn!("Skipping {} frame with unexpected payload", raw.kind);
    }
    frame
}

fn parse_evidence(data: Value) -> Option<Vec<Evidence>> {
    match data {
        Value::Array(_) => serde_json::from_value(data).ok(),
        Value::Object(_) => serde_json::from_value::<Evidence>(data)
            .ok()
            .map(|e| vec![e]),
        _ => None,
    }
}

/// Incremental line splitter over raw body chunks. Keeps partial lines and
/// split UTF-8 sequences until the rest arrives.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    byte_buf: Vec<u8>,
    line_buf: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.byte_buf.extend_from_slice(bytes);

        loop {
            match std::str::from_utf8(&self.byte_buf) {
                Ok(s) => {
                    self.line_buf.push_str(s);
                    self.byte_buf.clear();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    if let Ok(s) = std::str::from_utf8(&self.byte_buf[..valid_up_to]) {
                        self.line_buf.push_str(s);
                    }
                    self.byte_buf.drain(..valid_up_to);
                    match e.error_len() {
                        // Incomplete sequence: wait for the next chunk.
                        None => break,
                        Some(bad) => {
                            self.byte_buf.drain(..bad);
                            self.line_buf.push(char::REPLACEMENT_CHARACTER);
                        }
                    }
                }
            }
        }

        let mut frames = Vec::new();
        while let Some(newline) = self.line_buf.find('\n') {
            let line: String = self.line_buf.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = parse_frame(line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.line_buf);
        self.byte_buf.clear();
        parse_frame(rest.trim_end_matches(['\n', '\r']))
    }
}

/// Read a chunked body to completion, forwarding each frame. Always ends with
/// either a `Done` frame or a `Failed` event.
pub async fn parse_frame_stream<S, E>(mut stream: S, tx: mpsc::Sender<StreamEvent>)
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut decoder = FrameDecoder::new();

    while let Some(chunk_result) = stream.next().await {
        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                let error = ApiError::StreamError(e.to_string());
                let _ = tx.send(StreamEvent::Failed(error.to_string())).await;
                return;
            }
        };

        for frame in decoder.push(&bytes) {
            let done = frame == Frame::Done;
            if tx.send(StreamEvent::Frame(frame)).await.is_err() {
                return; // receiver dropped
            }
            if done {
                return;
            }
        }
    }

    if let Some(frame) = decoder.finish() {
        let done = frame == Frame::Done;
        if tx.send(StreamEvent::Frame(frame)).await.is_err() || done {
            return;
        }
    }

    // Body ended without a done frame; treat it as complete.
    let _ = tx.send(StreamEvent::Frame(Frame::Done)).await;
}
