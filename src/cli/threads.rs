//! Non-interactive thread management: `threads`, `history`, and `delete`.

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use futures_util::future::join_all;

use crate::core::app::{ThreadSummary, UiEvent};
use crate::core::backend::{BackendError, ChatBackend, HttpBackend};
use crate::core::config::Settings;
use crate::core::constants::DEFAULT_THREAD_TITLE;
use crate::core::thread_id::ThreadId;
use crate::ui::render::Renderer;

fn http_backend(settings: &Settings) -> Result<Arc<dyn ChatBackend>, BackendError> {
    let backend = HttpBackend::new(settings.base_url.clone(), settings.connect_timeout)?;
    Ok(Arc::new(backend))
}

pub async fn list_threads(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let backend = http_backend(settings)?;
    write_thread_list(backend.as_ref(), &mut io::stdout()).await
}

pub async fn show_history(settings: &Settings, id: &str) -> Result<(), Box<dyn Error>> {
    let backend = http_backend(settings)?;
    write_history(backend.as_ref(), &ThreadId::from(id), &mut io::stdout()).await
}

pub async fn delete_thread(settings: &Settings, id: &str) -> Result<(), Box<dyn Error>> {
    let backend = http_backend(settings)?;
    let thread_id = ThreadId::from(id);
    backend.delete_thread(&thread_id).await?;
    println!("✅ Deleted thread {thread_id}");
    Ok(())
}

/// List server threads most recent first, resolving titles concurrently. A title that
/// cannot be fetched falls back to the default.
pub async fn write_thread_list<W: Write>(
    backend: &dyn ChatBackend,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let ids = backend.list_threads().await?;
    let titles = join_all(ids.iter().map(|id| async move {
        backend
            .fetch_history(id)
            .await
            .map(|state| state.title)
            .unwrap_or_else(|_| DEFAULT_THREAD_TITLE.to_string())
    }))
    .await;

    let summaries = ids
        .into_iter()
        .zip(titles)
        .rev()
        .map(|(id, title)| ThreadSummary {
            id,
            title,
            is_active: false,
            is_streaming: false,
        })
        .collect();

    let mut renderer = Renderer::new(out);
    renderer.render_all([UiEvent::ThreadList(summaries)])?;
    Ok(())
}

pub async fn write_history<W: Write>(
    backend: &dyn ChatBackend,
    thread_id: &ThreadId,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let state = backend.fetch_history(thread_id).await?;
    let mut renderer = Renderer::new(out);
    renderer.render_all([
        UiEvent::Info(format!("── {} ({}) ──", state.title, state.id)),
        UiEvent::History(state.messages),
    ])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Message;
    use crate::core::registry::ThreadState;
    use crate::utils::test_utils::ScriptedBackend;

    #[tokio::test]
    async fn thread_list_is_most_recent_first_with_titles() {
        let backend = ScriptedBackend::new()
            .with_threads(&["old", "new"])
            .with_history(ThreadState::with_history(
                ThreadId::from("new"),
                Some("Fresh Topic"),
                Vec::new(),
            ));
        let mut out = Vec::new();
        write_thread_list(&backend, &mut out).await.expect("list");

        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "Conversations:\n   1. Fresh Topic  [new]\n   2. New Conversation  [old]\n"
        );
    }

    #[tokio::test]
    async fn history_prints_header_and_messages() {
        let backend = ScriptedBackend::new().with_history(ThreadState::with_history(
            ThreadId::from("t1"),
            Some("Greetings"),
            vec![Message::user("hi"), Message::assistant("hello")],
        ));
        let mut out = Vec::new();
        write_history(&backend, &ThreadId::from("t1"), &mut out)
            .await
            .expect("history");

        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "── Greetings (t1) ──\nYou: hi\nAssistant: hello\n"
        );
    }

    #[tokio::test]
    async fn unknown_thread_history_is_empty() {
        let backend = ScriptedBackend::new();
        let mut out = Vec::new();
        write_history(&backend, &ThreadId::from("missing"), &mut out)
            .await
            .expect("history");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "── New Conversation (missing) ──\n(no messages yet)\n"
        );
    }
}
