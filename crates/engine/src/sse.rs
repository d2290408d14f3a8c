//! Frame decoding for the answering service's event stream.
//!
//! The backend writes newline-delimited frames.  A frame is either an SSE
//! `data: <json>` line or a bare JSON object on its own line; `event:`,
//! `id:` and `retry:` lines carry protocol metadata we do not use.
//!
//! This module provides two layers:
//! - [`FrameDecoder`] -- a synchronous carry-over buffer that turns byte
//!   chunks into payload strings
//! - [`decode_frames`] -- an async adapter from a byte-chunk stream to a
//!   lazy payload stream, honouring a [`CancellationToken`]

use ds_domain::error::Result;
use ds_domain::stream::BoxStream;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;


/// Legacy end-of-stream sentinel; carries no packet.
const DONE_SENTINEL: &str = "[DONE]";

/// Metadata prefixes that are dropped without logging.
const METADATA_PREFIXES: [&str; 3] = ["event:", "id:", "retry:"];

/// Carry-over line buffer for a single response body.
///
/// Bytes are buffered raw and only decoded once a full line is available,
/// so a multi-byte UTF-8 sequence split across two network reads is never
/// mangled.  The trailing partial line always stays in the buffer.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every payload completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let complete: Vec<u8> = self.buffer.drain(..=last_newline).collect();
        complete
            .split(|&b| b == b'\n')
            .filter_map(|line| decode_line(&String::from_utf8_lossy(line)))
            .collect()
    }

    /// Flush the unterminated tail at natural end-of-stream.
    ///
    /// The buffer is empty afterwards.
    pub fn finish(&mut self) -> Vec<String> {
        let tail = std::mem::take(&mut self.buffer);
        if tail.is_empty() {
            return Vec::new();
        }
        decode_line(&String::from_utf8_lossy(&tail))
            .into_iter()
            .collect()
    }

    /// Drop any buffered partial line.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Interpret one complete line.  Returns the payload to emit, if any.
pub(crate) fn decode_line(raw: &str) -> Option<String> {
    let line = raw.strip_suffix('\r').unwrap_or(raw);

    if let Some(rest) = line.strip_prefix("data:") {
        let payload = rest.strip_prefix(' ').unwrap_or(rest);
        if payload == DONE_SENTINEL || payload.trim().is_empty() {
            return None;
        }
        return Some(payload.to_string());
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return match serde_json::from_str::<serde::de::IgnoredAny>(trimmed) {
            Ok(_) => Some(trimmed.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, line = %truncate(trimmed), "skipping malformed JSON frame");
                None
            }
        };
    }

    if METADATA_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return None;
    }

    tracing::warn!(line = %truncate(trimmed), "skipping unexpected stream line");
    None
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(120) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

enum Read {
    Cancelled,
    Chunk(Option<Result<Vec<u8>>>),
}

/// Turn a response body into a lazy, finite sequence of payload strings.
///
/// The body stream is owned by the returned stream and released on every
/// exit path: natural end, transport error, cancellation, or the consumer
/// dropping the returned stream early.  A transport error is yielded once
/// and ends the sequence.
pub fn decode_frames(
    body: BoxStream<'static, Result<Vec<u8>>>,
    cancel: CancellationToken,
) -> BoxStream<'static, Result<String>> {
    let stream = async_stream::stream! {
        let mut body = body;
        let mut decoder = FrameDecoder::new();

        loop {
            if cancel.is_cancelled() {
                tracing::debug!(buffered = decoder.buffered_len(), "frame decoding cancelled");
                break;
            }

            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => Read::Cancelled,
                chunk = body.next() => Read::Chunk(chunk),
            };

            match read {
                Read::Cancelled => {
                    tracing::debug!(buffered = decoder.buffered_len(), "frame decoding cancelled");
                    break;
                }
                Read::Chunk(Some(Ok(bytes))) => {
                    for payload in decoder.push(&bytes) {
                        yield Ok(payload);
                    }
                }
                Read::Chunk(Some(Err(e))) => {
                    yield Err(e);
                    break;
                }
                Read::Chunk(None) => {
                    for payload in decoder.finish() {
                        yield Ok(payload);
                    }
                    break;
                }
            }
        }

        decoder.clear();
        drop(body);
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
