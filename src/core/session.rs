//! Per-thread chat turns: open a stream, forward tokens, return the full reply.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use tracing::debug;

use crate::core::backend::{BackendError, ChatBackend};
use crate::core::chat_stream::{StreamError, TokenStream};
use crate::core::thread_id::ThreadId;

#[derive(Debug)]
pub enum SessionError {
    EmptyMessage,
    /// Another send is still streaming into this thread.
    AlreadyStreaming(ThreadId),
    Backend(BackendError),
    Stream(StreamError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::EmptyMessage => f.write_str("message is empty"),
            SessionError::AlreadyStreaming(id) => {
                write!(f, "a reply is still streaming for thread {id}")
            }
            SessionError::Backend(err) => err.fmt(f),
            SessionError::Stream(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Backend(err) => Some(err),
            SessionError::Stream(err) => Some(err),
            _ => None,
        }
    }
}

type ActiveSet = Arc<Mutex<HashSet<ThreadId>>>;

/// Marks a thread as streaming for as long as it is alive.
struct ActiveSession {
    active: ActiveSet,
    thread_id: ThreadId,
}

impl ActiveSession {
    fn acquire(active: &ActiveSet, thread_id: &ThreadId) -> Result<Self, SessionError> {
        let mut set = active.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(thread_id.clone()) {
            return Err(SessionError::AlreadyStreaming(thread_id.clone()));
        }
        Ok(Self {
            active: Arc::clone(active),
            thread_id: thread_id.clone(),
        })
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.thread_id);
    }
}

/// Issues chat turns against a [`ChatBackend`], allowing at most one in-flight stream
/// per thread. Cloning shares the in-flight bookkeeping.
#[derive(Clone)]
pub struct ChatSessionClient {
    backend: Arc<dyn ChatBackend>,
    active: ActiveSet,
}

impl ChatSessionClient {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn is_streaming(&self, thread_id: &ThreadId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(thread_id)
    }

    /// Send `message` on `thread_id`, calling `on_token` for every decoded token in
    /// order. Returns the concatenation of all delivered tokens.
    ///
    /// No retries are attempted. Dropping the returned future releases the thread.
    pub async fn send<F>(
        &self,
        thread_id: &ThreadId,
        message: &str,
        mut on_token: F,
    ) -> Result<String, SessionError>
    where
        F: FnMut(&str),
    {
        if message.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let _session = ActiveSession::acquire(&self.active, thread_id)?;

        let body = self
            .backend
            .open_chat_stream(thread_id, message)
            .await
            .map_err(SessionError::Backend)?;

        let mut tokens = TokenStream::new(body);
        while let Some(item) = tokens.next().await {
            let token = item.map_err(SessionError::Stream)?;
            on_token(&token);
        }

        let full_text = tokens.into_full_text();
        debug!(thread_id = %thread_id, chars = full_text.len(), "Chat stream finished");
        Ok(full_text)
    }
}
