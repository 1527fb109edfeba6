use tracing::{debug, warn};

use super::{App, UiEvent};
use crate::core::constants::STREAM_ERROR_MARKER;
use crate::core::message::Message;
use crate::core::registry::ThreadState;
use crate::core::thread_id::ThreadId;

/// Results reported back to the [`App`] by background tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    StreamToken {
        thread_id: ThreadId,
        stream_id: u64,
        token: String,
    },
    StreamCompleted {
        thread_id: ThreadId,
        stream_id: u64,
        full_text: String,
    },
    StreamFailed {
        thread_id: ThreadId,
        stream_id: u64,
        message: String,
    },
    TitleInferred {
        thread_id: ThreadId,
        title: String,
    },
    ThreadCreated {
        local_id: ThreadId,
        server_id: ThreadId,
    },
    ThreadCreateFailed {
        local_id: ThreadId,
        error: String,
    },
    ThreadsListed {
        ids: Vec<ThreadId>,
    },
    ThreadsListFailed {
        error: String,
    },
    TitleLoaded {
        thread_id: ThreadId,
        title: String,
    },
    ThreadLoaded {
        state: ThreadState,
    },
    ThreadLoadFailed {
        thread_id: ThreadId,
        error: String,
    },
    ThreadDeleted {
        thread_id: ThreadId,
    },
    ThreadDeleteFailed {
        thread_id: ThreadId,
        error: String,
    },
}

/// Work the executor should perform on behalf of the [`App`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    SpawnStream {
        thread_id: ThreadId,
        stream_id: u64,
        message: String,
    },
    InferTitle {
        thread_id: ThreadId,
        text: String,
    },
    CreateThread {
        local_id: ThreadId,
    },
    ListThreads,
    /// Lazily fetch the stored title of a thread that was only listed by id.
    FetchTitle {
        thread_id: ThreadId,
    },
    LoadThread {
        thread_id: ThreadId,
    },
    DeleteThread {
        thread_id: ThreadId,
    },
}

pub fn apply_actions(
    app: &mut App,
    actions: impl IntoIterator<Item = AppAction>,
) -> Vec<AppCommand> {
    let mut commands = Vec::new();
    for action in actions {
        commands.extend(apply_action(app, action));
    }
    commands
}

pub fn apply_action(app: &mut App, action: AppAction) -> Vec<AppCommand> {
    match action {
        AppAction::StreamToken {
            thread_id,
            stream_id,
            token,
        } => {
            append_stream_token(app, &thread_id, stream_id, token);
            Vec::new()
        }
        AppAction::StreamCompleted {
            thread_id,
            stream_id,
            full_text,
        } => {
            finish_stream(app, &thread_id, stream_id, Ok(full_text));
            Vec::new()
        }
        AppAction::StreamFailed {
            thread_id,
            stream_id,
            message,
        } => {
            finish_stream(app, &thread_id, stream_id, Err(message));
            Vec::new()
        }
        AppAction::TitleInferred { thread_id, title }
        | AppAction::TitleLoaded { thread_id, title } => {
            update_title(app, &thread_id, &title);
            Vec::new()
        }
        AppAction::ThreadCreated { local_id, server_id } => {
            if app.registry.confirm_thread(&local_id, server_id).is_none() {
                debug!(thread_id = %local_id, "Confirmed thread was already deleted");
            }
            Vec::new()
        }
        AppAction::ThreadCreateFailed { local_id, error } => {
            warn!(thread_id = %local_id, %error, "Server did not confirm new thread");
            Vec::new()
        }
        AppAction::ThreadsListed { ids } => app
            .registry
            .merge_server_threads(ids)
            .into_iter()
            .map(|thread_id| AppCommand::FetchTitle { thread_id })
            .collect(),
        AppAction::ThreadsListFailed { error } => {
            app.push_ui_event(UiEvent::Error(format!("Could not load threads: {error}")));
            Vec::new()
        }
        AppAction::ThreadLoaded { state } => {
            load_thread(app, state);
            Vec::new()
        }
        AppAction::ThreadLoadFailed { thread_id, error } => {
            app.push_ui_event(UiEvent::Error(format!(
                "Could not load thread {thread_id}: {error}"
            )));
            Vec::new()
        }
        AppAction::ThreadDeleted { thread_id } => {
            remove_thread(app, &thread_id);
            Vec::new()
        }
        AppAction::ThreadDeleteFailed { thread_id, error } => {
            app.push_ui_event(UiEvent::Error(format!(
                "Could not delete thread {thread_id}: {error}"
            )));
            Vec::new()
        }
    }
}

/// Whether `stream_id` is the live stream for `thread_id`; stale streams are ignored.
fn is_current_stream(app: &App, thread_id: &ThreadId, stream_id: u64) -> bool {
    app.streams
        .get(thread_id)
        .is_some_and(|s| s.is_active && s.stream_id == stream_id)
}

fn append_stream_token(app: &mut App, thread_id: &ThreadId, stream_id: u64, token: String) {
    if !is_current_stream(app, thread_id, stream_id) {
        return;
    }
    if let Some(session) = app.streams.get_mut(thread_id) {
        session.accumulated_text.push_str(&token);
    }
    if app.registry.is_active(thread_id) {
        app.push_ui_event(UiEvent::Token(token));
    }
}

fn finish_stream(
    app: &mut App,
    thread_id: &ThreadId,
    stream_id: u64,
    outcome: Result<String, String>,
) {
    if !is_current_stream(app, thread_id, stream_id) {
        debug!(thread_id = %thread_id, stream_id, "Ignoring result of stale stream");
        return;
    }
    let Some(session) = app.streams.remove(thread_id) else {
        return;
    };

    let (reply, event) = match outcome {
        Ok(full_text) => {
            let text = if full_text.is_empty() {
                session.accumulated_text
            } else {
                full_text
            };
            (Message::assistant(text), UiEvent::ReplyFinished)
        }
        Err(message) => {
            let message = message.trim().to_string();
            (
                Message::assistant(format!("{STREAM_ERROR_MARKER} {message}")),
                UiEvent::ReplyFailed(message),
            )
        }
    };

    app.log_transcript(&reply);
    if !app.registry.append_message(thread_id, reply) {
        debug!(thread_id = %thread_id, "Reply arrived for a deleted thread");
        return;
    }
    if app.registry.is_active(thread_id) {
        app.push_ui_event(event);
    }
}

fn update_title(app: &mut App, thread_id: &ThreadId, title: &str) {
    let previous = app.registry.title(thread_id).to_string();
    if !app.registry.set_title(thread_id, title) {
        return;
    }
    let title = app.registry.title(thread_id).to_string();
    if title == previous || !app.registry.is_active(thread_id) {
        return;
    }
    app.push_ui_event(UiEvent::TitleChanged {
        id: thread_id.clone(),
        title,
    });
}

fn load_thread(app: &mut App, mut state: ThreadState) {
    // A snapshot taken mid-stream may already contain the reply still arriving here.
    if app.is_streaming(&state.id) {
        if let Some(local) = app.registry.get(&state.id) {
            debug!(thread_id = %state.id, "Keeping local history while a reply streams");
            state.messages = local.messages.clone();
        }
    }
    app.registry.load_thread(state);
    app.announce_active_thread();
}

fn remove_thread(app: &mut App, thread_id: &ThreadId) {
    let was_active = app.registry.is_active(thread_id);
    if app.registry.delete_thread(thread_id).is_none() {
        return;
    }
    app.streams.remove(thread_id);
    app.push_ui_event(UiEvent::Info(format!("Deleted thread {thread_id}")));
    if was_active {
        app.announce_active_thread();
    }
}
