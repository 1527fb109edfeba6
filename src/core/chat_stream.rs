//! Decoding of the `data:`-framed token stream returned by `POST /chat/stream`.
//!
//! [`SseDecoder`] is the push-based core: feed it raw body chunks in any split and it
//! yields [`StreamEvent`]s for every complete line. [`TokenStream`] wraps a byte stream
//! (usually `reqwest::Response::bytes_stream`) and exposes the decoded tokens as a lazy,
//! single-pass [`Stream`].

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures_util::stream::FusedStream;
use futures_util::{Stream, StreamExt};
use memchr::memchr;
use tracing::trace;

use crate::api::StreamFrame;
use crate::core::constants::{SSE_DATA_PREFIX, STREAM_DONE_SENTINEL};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Token(String),
    Error(String),
    Done,
}

impl StreamEvent {
    fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Error(_) | StreamEvent::Done)
    }
}

/// Failure that aborts a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamError {
    /// The server sent an `{"error": ...}` frame.
    Server(String),
    /// Reading the response body failed.
    Transport(String),
}

impl StreamError {
    pub fn message(&self) -> &str {
        match self {
            StreamError::Server(message) | StreamError::Transport(message) => message,
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for StreamError {}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix(SSE_DATA_PREFIX).map(str::trim)
}

fn decode_payload(payload: &str) -> Option<StreamEvent> {
    if payload == STREAM_DONE_SENTINEL {
        return Some(StreamEvent::Done);
    }

    match serde_json::from_str::<StreamFrame>(payload) {
        Ok(frame) => {
            if let Some(error) = frame.error.filter(|e| !e.is_empty()) {
                return Some(StreamEvent::Error(error));
            }
            frame
                .token
                .filter(|token| !token.is_empty())
                .map(StreamEvent::Token)
        }
        Err(err) => {
            trace!(error = %err, payload, "Dropping malformed stream frame");
            None
        }
    }
}

fn decode_line(raw: &[u8]) -> Option<StreamEvent> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line,
        Err(err) => {
            trace!(error = %err, "Dropping stream line with invalid UTF-8");
            return None;
        }
    };
    extract_data_payload(line).and_then(decode_payload)
}

/// Incremental line decoder with a carry-over buffer for partial lines.
///
/// Once a terminal event (`Done` or `Error`) has been produced the decoder is finished
/// and ignores all further input.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    full_text: String,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a body chunk and decode every line it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend_from_slice(chunk);
        let mut consumed = 0;
        while let Some(offset) = memchr(b'\n', &self.buffer[consumed..]) {
            let line_end = consumed + offset;
            let event = decode_line(&self.buffer[consumed..line_end]);
            consumed = line_end + 1;
            if let Some(event) = event {
                if self.record(event, &mut events) {
                    break;
                }
            }
        }

        if self.finished {
            self.buffer.clear();
        } else {
            self.buffer.drain(..consumed);
        }
        events
    }

    /// Signal that the body ended. A trailing unterminated line is decoded as if it were
    /// complete; the result always ends with exactly one terminal event unless the decoder
    /// had already finished.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        let rest = std::mem::take(&mut self.buffer);
        if let Some(event) = decode_line(&rest) {
            self.record(event, &mut events);
        }
        if !self.finished {
            self.record(StreamEvent::Done, &mut events);
        }
        events
    }

    fn record(&mut self, event: StreamEvent, events: &mut Vec<StreamEvent>) -> bool {
        if let StreamEvent::Token(token) = &event {
            self.full_text.push_str(token);
        }
        let terminal = event.is_terminal();
        if terminal {
            self.finished = true;
        }
        events.push(event);
        terminal
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Concatenation of every token decoded so far.
    pub fn full_text(&self) -> &str {
        &self.full_text
    }
}

/// Lazy token sequence over a chunked byte stream.
///
/// Yields `Ok(token)` per decoded token and ends with `None` on the `[DONE]` sentinel or
/// when the body closes. A server error frame or a body read failure is yielded once as
/// `Err` and ends the sequence.
pub struct TokenStream<S> {
    inner: S,
    decoder: SseDecoder,
    pending: VecDeque<StreamEvent>,
    terminated: bool,
}

impl<S> TokenStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            terminated: false,
        }
    }

    pub fn full_text(&self) -> &str {
        self.decoder.full_text()
    }

    pub fn into_full_text(self) -> String {
        self.decoder.full_text
    }
}

impl<S, B, E> Stream for TokenStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    type Item = Result<String, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                match event {
                    StreamEvent::Token(token) => return Poll::Ready(Some(Ok(token))),
                    StreamEvent::Error(message) => {
                        this.terminated = true;
                        this.pending.clear();
                        return Poll::Ready(Some(Err(StreamError::Server(message))));
                    }
                    StreamEvent::Done => {
                        this.terminated = true;
                        this.pending.clear();
                        return Poll::Ready(None);
                    }
                }
            }

            if this.terminated {
                return Poll::Ready(None);
            }

            match ready!(this.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => this.pending.extend(this.decoder.feed(chunk.as_ref())),
                Some(Err(err)) => {
                    this.terminated = true;
                    return Poll::Ready(Some(Err(StreamError::Transport(err.to_string()))));
                }
                None => this.pending.extend(this.decoder.finish()),
            }
        }
    }
}

impl<S, B, E> FusedStream for TokenStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}
