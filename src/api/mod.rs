//! Request and response payloads exchanged with the Synapse backend.

use serde::{Deserialize, Serialize};

use crate::core::message::Message;
use crate::core::thread_id::ThreadId;

#[derive(Serialize)]
pub struct ChatStreamRequest<'a> {
    pub thread_id: &'a ThreadId,
    pub message: &'a str,
}

#[derive(Serialize)]
pub struct SummaryRequest<'a> {
    pub text: &'a str,
}

#[derive(Deserialize)]
pub struct NewThreadResponse {
    pub thread_id: ThreadId,
}

#[derive(Deserialize)]
pub struct ThreadsResponse {
    #[serde(default)]
    pub threads: Vec<ThreadId>,
}

#[derive(Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
    #[serde(default)]
    pub title: Option<String>,
}

/// History entries are kept loose so an unexpected role does not reject the whole payload.
#[derive(Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl HistoryMessage {
    pub fn into_message(self) -> Option<Message> {
        let role = self.role.as_str().try_into().ok()?;
        Some(Message {
            role,
            content: self.content,
        })
    }
}

#[derive(Deserialize)]
pub struct SummaryResponse {
    #[serde(default)]
    pub title: Option<String>,
}

/// One decoded `data:` record on the chat stream.
#[derive(Deserialize, Debug, Default)]
pub struct StreamFrame {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
