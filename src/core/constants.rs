//! Shared constants used across the application

/// Title shown for threads that have not been summarized yet.
pub const DEFAULT_THREAD_TITLE: &str = "New Conversation";

/// First user messages shorter than this (in characters) never trigger title inference.
pub const TITLE_MIN_CHARS: usize = 15;

/// Marker that prefixes every event line on the chat stream.
pub const SSE_DATA_PREFIX: &str = "data:";

/// Payload that terminates a chat stream successfully.
pub const STREAM_DONE_SENTINEL: &str = "[DONE]";

/// Prefix used when a failed send is recorded in the transcript.
pub const STREAM_ERROR_MARKER: &str = "⚠️ **Error:**";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
