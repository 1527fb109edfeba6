use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};

use crate::core::app::App;
use crate::core::backend::{BackendError, ByteStream, ChatBackend};
use crate::core::constants::TITLE_MIN_CHARS;
use crate::core::message::Message;
use crate::core::registry::ThreadState;
use crate::core::thread_id::ThreadId;
use crate::utils::logging::TranscriptLog;

enum StreamScript {
    Chunks(Vec<String>),
    Endless,
    Status(u16),
}

#[derive(Default)]
struct Calls {
    summaries: Vec<String>,
    streams: Vec<(ThreadId, String)>,
    deleted: Vec<ThreadId>,
}

/// In-memory [`ChatBackend`] with canned responses that records what it was asked.
pub struct ScriptedBackend {
    stream: StreamScript,
    summary_title: Option<String>,
    created_id: ThreadId,
    threads: Vec<ThreadId>,
    histories: HashMap<ThreadId, ThreadState>,
    calls: Arc<Mutex<Calls>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            stream: StreamScript::Chunks(vec![
                "data: {\"token\":\"He\"}\n".to_string(),
                "data: {\"token\":\"llo\"}\n".to_string(),
                "data: [DONE]\n".to_string(),
            ]),
            summary_title: Some("Test Title".to_string()),
            created_id: ThreadId::from("server-thread"),
            threads: Vec::new(),
            histories: HashMap::new(),
            calls: Arc::new(Mutex::new(Calls::default())),
        }
    }

    pub fn with_stream_chunks(mut self, chunks: Vec<&str>) -> Self {
        self.stream = StreamScript::Chunks(chunks.into_iter().map(str::to_string).collect());
        self
    }

    pub fn with_endless_stream(mut self) -> Self {
        self.stream = StreamScript::Endless;
        self
    }

    pub fn with_stream_status(mut self, status: u16) -> Self {
        self.stream = StreamScript::Status(status);
        self
    }

    pub fn with_summary_title(mut self, title: &str) -> Self {
        self.summary_title = Some(title.to_string());
        self
    }

    pub fn with_failing_summary(mut self) -> Self {
        self.summary_title = None;
        self
    }

    pub fn with_created_id(mut self, id: &str) -> Self {
        self.created_id = ThreadId::from(id);
        self
    }

    pub fn with_threads(mut self, ids: &[&str]) -> Self {
        self.threads = ids.iter().map(|id| ThreadId::from(*id)).collect();
        self
    }

    pub fn with_history(mut self, state: ThreadState) -> Self {
        self.histories.insert(state.id.clone(), state);
        self
    }

    pub fn summary_requests(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.summaries.clone()).unwrap_or_default()
    }

    pub fn stream_requests(&self) -> Vec<(ThreadId, String)> {
        self.calls.lock().map(|c| c.streams.clone()).unwrap_or_default()
    }

    pub fn deleted_threads(&self) -> Vec<ThreadId> {
        self.calls.lock().map(|c| c.deleted.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn create_thread(&self) -> Result<ThreadId, BackendError> {
        Ok(self.created_id.clone())
    }

    async fn list_threads(&self) -> Result<Vec<ThreadId>, BackendError> {
        Ok(self.threads.clone())
    }

    async fn fetch_history(&self, thread_id: &ThreadId) -> Result<ThreadState, BackendError> {
        Ok(self
            .histories
            .get(thread_id)
            .cloned()
            .unwrap_or_else(|| ThreadState::new(thread_id.clone())))
    }

    async fn delete_thread(&self, thread_id: &ThreadId) -> Result<(), BackendError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.deleted.push(thread_id.clone());
        }
        Ok(())
    }

    async fn summarize(&self, text: &str) -> Result<String, BackendError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.summaries.push(text.to_string());
        }
        self.summary_title.clone().ok_or(BackendError::Status {
            status: 500,
            detail: None,
        })
    }

    async fn open_chat_stream(
        &self,
        thread_id: &ThreadId,
        message: &str,
    ) -> Result<ByteStream, BackendError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.streams.push((thread_id.clone(), message.to_string()));
        }
        match &self.stream {
            StreamScript::Chunks(chunks) => {
                let chunks: Vec<Result<Vec<u8>, BackendError>> = chunks
                    .iter()
                    .map(|chunk| Ok(chunk.as_bytes().to_vec()))
                    .collect();
                Ok(stream::iter(chunks).boxed())
            }
            StreamScript::Endless => {
                Ok(stream::pending::<Result<Vec<u8>, BackendError>>().boxed())
            }
            StreamScript::Status(status) => Err(BackendError::Status {
                status: *status,
                detail: None,
            }),
        }
    }
}

pub fn create_test_app() -> App {
    App::new(TITLE_MIN_CHARS, TranscriptLog::new(None))
}

pub fn create_test_messages() -> Vec<Message> {
    vec![
        Message::user("Hello"),
        Message::assistant("Hi there!"),
        Message::user("How are you?"),
        Message::assistant("I'm doing well, thank you for asking!"),
    ]
}
