//! Token-Stream Parser
//!
//! Decodes a server-sent-event byte stream of chat-completion chunks into text deltas.
//! Records have the form `data: <json>` separated by blank lines, terminated by the
//! literal `data: [DONE]`. Comment lines (`:`), blank lines, and non-`data` fields are
//! ignored.
//!
//! Bytes are buffered until a full line has arrived, so the decoded sequence does not
//! depend on how the transport chunks the body. A complete `data:` line that still fails
//! to parse is held back once and joined with the following line, which recovers records
//! broken by a stray line break; if the joined text does not parse either, the record is
//! dropped.

use crate::error::ApiError;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::debug;

/// Raw response body as delivered by a gateway.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ApiError>> + Send>>;

/// Decoded events, in arrival order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ApiError>> + Send>>;

/// Text deltas only.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, ApiError>> + Send>>;

const DONE_SENTINEL: &str = "[DONE]";
const FINISH_REASON_LENGTH: &str = "length";

/// One decoded stream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Non-empty fragment of generated text
    Delta(String),
    /// The model reported why it stopped (`stop`, `length`, ...)
    Finished { reason: String },
}

impl StreamEvent {
    /// True when the model stopped because it ran out of output tokens.
    pub fn is_truncation(&self) -> bool {
        matches!(self, StreamEvent::Finished { reason } if reason == FINISH_REASON_LENGTH)
    }
}

/// Incremental, chunk-fed SSE decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    pending: Option<String>,
    done: bool,
    dropped: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `[DONE]` was seen or input was finished; further input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of records dropped as malformed.
    pub fn dropped_records(&self) -> usize {
        self.dropped
    }

    /// Feed one transport chunk and collect the events completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let mut rest = chunk;
        while !self.done {
            match rest.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.line.extend_from_slice(&rest[..pos]);
                    let line = std::mem::take(&mut self.line);
                    self.process_line(&line, &mut events);
                    rest = &rest[pos + 1..];
                }
                None => {
                    self.line.extend_from_slice(rest);
                    break;
                }
            }
        }
        events
    }

    /// Drain whatever is left once the underlying stream has ended.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.done && !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            self.process_line(&line, &mut events);
        }
        if let Some(pending) = self.pending.take() {
            self.drop_record(&pending);
        }
        self.line.clear();
        self.done = true;
        events
    }

    fn process_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        let decoded = String::from_utf8_lossy(raw);
        let text = decoded.strip_suffix('\r').unwrap_or(&decoded);
        if text.trim().is_empty() {
            return;
        }

        if let Some(pending) = self.pending.take() {
            let joined = format!("{}{}", pending, text);
            match serde_json::from_str::<Value>(&joined) {
                Ok(record) => {
                    self.emit_record(&record, events);
                    return;
                }
                Err(_) => self.drop_record(&pending),
            }
        }

        let trimmed = text.trim();
        if trimmed.starts_with(':') {
            return;
        }
        let Some(payload) = trimmed.strip_prefix("data:") else {
            return;
        };
        let payload = payload.trim_start();
        if payload == DONE_SENTINEL {
            self.done = true;
            return;
        }
        if payload.is_empty() {
            return;
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(record) => self.emit_record(&record, events),
            Err(_) => self.pending = Some(payload.to_string()),
        }
    }

    fn emit_record(&self, record: &Value, events: &mut Vec<StreamEvent>) {
        if let Some(content) = record
            .pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
        {
            if !content.is_empty() {
                events.push(StreamEvent::Delta(content.to_string()));
            }
        }
        if let Some(reason) = record
            .pointer("/choices/0/finish_reason")
            .and_then(Value::as_str)
        {
            events.push(StreamEvent::Finished {
                reason: reason.to_string(),
            });
        }
    }

    fn drop_record(&mut self, payload: &str) {
        self.dropped += 1;
        let err = ApiError::MalformedRecord(payload.chars().take(80).collect());
        debug!(error = %err, "Dropping stream record");
    }
}

/// Decode a byte stream into a lazy, finite sequence of events.
///
/// The sequence ends permanently at `[DONE]`, at the end of the body, or after the
/// first transport error.
pub fn decode_stream(bytes: ByteStream) -> EventStream {
    struct State {
        bytes: Option<ByteStream>,
        decoder: SseDecoder,
        queued: VecDeque<StreamEvent>,
    }

    let state = State {
        bytes: Some(bytes),
        decoder: SseDecoder::new(),
        queued: VecDeque::new(),
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.queued.pop_front() {
                return Some((Ok(event), st));
            }
            if st.decoder.is_done() {
                st.bytes = None;
            }
            let body = st.bytes.as_mut()?;
            let next = body.next().await;
            match next {
                Some(Ok(chunk)) => st.queued.extend(st.decoder.feed(&chunk)),
                Some(Err(err)) => {
                    st.bytes = None;
                    return Some((Err(err), st));
                }
                None => {
                    st.bytes = None;
                    st.queued.extend(st.decoder.finish());
                }
            }
        }
    })
    .boxed()
}

/// Decode a byte stream, keeping only text deltas.
pub fn delta_stream(bytes: ByteStream) -> DeltaStream {
    decode_stream(bytes)
        .try_filter_map(|event| async move {
            Ok(match event {
                StreamEvent::Delta(text) => Some(text),
                StreamEvent::Finished { .. } => None,
            })
        })
        .boxed()
}
