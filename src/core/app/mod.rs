//! Conversation state machine.
//!
//! [`App`] owns the [`ThreadRegistry`] and the per-thread streaming buffers. It never
//! performs I/O: user operations and [`AppAction`]s (results reported back by background
//! tasks) mutate state and return [`AppCommand`]s for an executor to run. Everything the
//! presentation layer should show is queued as [`UiEvent`]s.

mod actions;
pub mod executor;


use std::collections::{HashMap, VecDeque};
use std::fmt;

use tracing::{debug, warn};

pub use actions::{apply_action, apply_actions, AppAction, AppCommand};

use crate::core::message::Message;
use crate::core::registry::ThreadRegistry;
use crate::core::thread_id::ThreadId;
use crate::core::title::should_infer_title;
use crate::utils::logging::TranscriptLog;

/// Streaming buffer for one in-flight reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSession {
    pub thread_id: ThreadId,
    pub stream_id: u64,
    pub accumulated_text: String,
    pub is_active: bool,
}

/// Row of the thread list as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSummary {
    pub id: ThreadId,
    pub title: String,
    pub is_active: bool,
    pub is_streaming: bool,
}

/// Something the presentation layer should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A token of the reply streaming into the active thread.
    Token(String),
    ReplyFinished,
    ReplyFailed(String),
    /// The active thread changed (created, loaded, or replaced after delete).
    ThreadSwitched {
        id: ThreadId,
        title: String,
        messages: Vec<Message>,
        /// Text streamed so far when the thread still has a reply in flight.
        partial_reply: Option<String>,
    },
    TitleChanged {
        id: ThreadId,
        title: String,
    },
    ThreadList(Vec<ThreadSummary>),
    History(Vec<Message>),
    Info(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    EmptyMessage,
    /// The target thread already has a reply streaming in.
    Busy(ThreadId),
    NothingToRetry,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::EmptyMessage => f.write_str("Message is empty"),
            SubmitError::Busy(_) => {
                f.write_str("A reply is still streaming in this thread; wait for it to finish")
            }
            SubmitError::NothingToRetry => f.write_str("No previous message to retry"),
        }
    }
}

impl std::error::Error for SubmitError {}

pub struct App {
    pub registry: ThreadRegistry,
    pub transcript: TranscriptLog,
    streams: HashMap<ThreadId, StreamSession>,
    next_stream_id: u64,
    title_min_chars: usize,
    ui_events: VecDeque<UiEvent>,
}

impl App {
    pub fn new(title_min_chars: usize, transcript: TranscriptLog) -> Self {
        Self {
            registry: ThreadRegistry::new(),
            transcript,
            streams: HashMap::new(),
            next_stream_id: 0,
            title_min_chars,
            ui_events: VecDeque::new(),
        }
    }

    pub fn push_ui_event(&mut self, event: UiEvent) {
        self.ui_events.push_back(event);
    }

    pub fn drain_ui_events(&mut self) -> Vec<UiEvent> {
        self.ui_events.drain(..).collect()
    }

    pub fn is_streaming(&self, thread_id: &ThreadId) -> bool {
        self.streams
            .get(thread_id)
            .is_some_and(|session| session.is_active)
    }

    pub fn has_active_streams(&self) -> bool {
        self.streams.values().any(|session| session.is_active)
    }

    /// The reply currently streaming into the active thread, if any.
    pub fn active_stream(&self) -> Option<&StreamSession> {
        self.streams
            .get(self.registry.active_id())
            .filter(|session| session.is_active)
    }

    /// Listed threads, most recent first.
    pub fn thread_summaries(&self) -> Vec<ThreadSummary> {
        self.registry
            .list_threads()
            .iter()
            .rev()
            .map(|id| ThreadSummary {
                id: id.clone(),
                title: self.registry.title(id).to_string(),
                is_active: self.registry.is_active(id),
                is_streaming: self.is_streaming(id),
            })
            .collect()
    }

    /// Resolve a user reference to a listed thread: a 1-based position in
    /// [`Self::thread_summaries`] or a full or unambiguous prefix of an id.
    pub fn resolve_thread_ref(&self, reference: &str) -> Option<ThreadId> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        let summaries = self.thread_summaries();
        if let Ok(position) = reference.parse::<usize>() {
            if let Some(summary) = position.checked_sub(1).and_then(|i| summaries.get(i)) {
                return Some(summary.id.clone());
            }
        }

        if let Some(exact) = summaries.iter().find(|s| s.id.as_str() == reference) {
            return Some(exact.id.clone());
        }
        let mut matches = summaries
            .iter()
            .filter(|s| s.id.as_str().starts_with(reference));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Some(only.id.clone()),
            _ => None,
        }
    }

    /// Submit a user message on the active thread.
    ///
    /// The message is appended optimistically before any network round-trip. Returns the
    /// stream to spawn and, for a qualifying first message, the title request.
    pub fn submit_message(&mut self, text: &str) -> Result<Vec<AppCommand>, SubmitError> {
        if text.trim().is_empty() {
            return Err(SubmitError::EmptyMessage);
        }
        let thread_id = self.registry.active_id().clone();
        if self.is_streaming(&thread_id) {
            return Err(SubmitError::Busy(thread_id));
        }

        let mut commands = Vec::new();
        if should_infer_title(self.registry.active(), text, self.title_min_chars) {
            commands.push(AppCommand::InferTitle {
                thread_id: thread_id.clone(),
                text: text.to_string(),
            });
        }

        let message = Message::user(text);
        self.log_transcript(&message);
        self.registry.append_message(&thread_id, message);

        self.next_stream_id += 1;
        let stream_id = self.next_stream_id;
        self.streams.insert(
            thread_id.clone(),
            StreamSession {
                thread_id: thread_id.clone(),
                stream_id,
                accumulated_text: String::new(),
                is_active: true,
            },
        );
        debug!(thread_id = %thread_id, stream_id, "Starting chat stream");

        commands.push(AppCommand::SpawnStream {
            thread_id,
            stream_id,
            message: text.to_string(),
        });
        Ok(commands)
    }

    /// Resend the last user message of the active thread.
    pub fn retry_last_message(&mut self) -> Result<Vec<AppCommand>, SubmitError> {
        let text = self
            .registry
            .active()
            .last_user_message()
            .map(|m| m.content.clone())
            .ok_or(SubmitError::NothingToRetry)?;
        self.submit_message(&text)
    }

    /// Start a new conversation locally; the server id is confirmed in the background.
    pub fn new_thread(&mut self) -> Vec<AppCommand> {
        let local_id = self.registry.create_thread();
        self.announce_active_thread();
        vec![AppCommand::CreateThread { local_id }]
    }

    pub fn refresh_threads(&self) -> Vec<AppCommand> {
        vec![AppCommand::ListThreads]
    }

    pub fn switch_thread(&mut self, thread_id: ThreadId) -> Vec<AppCommand> {
        vec![AppCommand::LoadThread { thread_id }]
    }

    pub fn delete_thread(&mut self, thread_id: ThreadId) -> Vec<AppCommand> {
        vec![AppCommand::DeleteThread { thread_id }]
    }

    pub fn show_thread_list(&mut self) {
        let summaries = self.thread_summaries();
        self.push_ui_event(UiEvent::ThreadList(summaries));
    }

    pub fn show_history(&mut self) {
        let messages = self.registry.active().messages.clone();
        self.push_ui_event(UiEvent::History(messages));
    }

    fn announce_active_thread(&mut self) {
        let active = self.registry.active();
        let event = UiEvent::ThreadSwitched {
            id: active.id.clone(),
            title: active.title.clone(),
            messages: active.messages.clone(),
            partial_reply: self
                .active_stream()
                .map(|session| session.accumulated_text.clone()),
        };
        self.push_ui_event(event);
    }

    fn log_transcript(&self, message: &Message) {
        if let Err(err) = self.transcript.log_message(message) {
            warn!(error = %err, "Failed to write transcript log");
        }
    }
}
