//! Automatic thread titles derived from the first user message.

use tracing::{debug, warn};

use crate::core::backend::ChatBackend;
use crate::core::registry::ThreadState;

/// Whether sending `text` on `thread` should request an inferred title: only the first
/// user message of a thread qualifies, and only when it is at least `min_chars` long.
pub fn should_infer_title(thread: &ThreadState, text: &str, min_chars: usize) -> bool {
    !thread.has_user_message() && text.chars().count() >= min_chars
}

/// Request a title for `text`. Failures are logged and yield `None`; callers keep the
/// current title in that case.
pub async fn infer_title(backend: &dyn ChatBackend, text: &str) -> Option<String> {
    match backend.summarize(text).await {
        Ok(title) => {
            debug!(%title, "Inferred thread title");
            Some(title)
        }
        Err(err) => {
            warn!(error = %err, "Title inference failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::TITLE_MIN_CHARS;
    use crate::core::message::Message;
    use crate::core::thread_id::ThreadId;
    use crate::utils::test_utils::ScriptedBackend;

    fn empty_thread() -> ThreadState {
        ThreadState::new(ThreadId::from("t"))
    }

    #[test]
    fn short_first_message_does_not_qualify() {
        assert!(!should_infer_title(&empty_thread(), "Hi", TITLE_MIN_CHARS));
        assert!(!should_infer_title(
            &empty_thread(),
            "fourteen chars",
            TITLE_MIN_CHARS
        ));
    }

    #[test]
    fn threshold_is_inclusive_and_counts_characters() {
        assert!(should_infer_title(
            &empty_thread(),
            "fifteen chars!!",
            TITLE_MIN_CHARS
        ));
        // 15 characters, more than 15 bytes.
        assert!(should_infer_title(
            &empty_thread(),
            "ééééééééééééééé",
            TITLE_MIN_CHARS
        ));
        assert!(!should_infer_title(
            &empty_thread(),
            "éééééééééééééé",
            TITLE_MIN_CHARS
        ));
    }

    #[test]
    fn later_messages_never_qualify() {
        let mut thread = empty_thread();
        thread.messages.push(Message::user("Hi"));
        thread.messages.push(Message::assistant("Hello!"));
        assert!(!should_infer_title(
            &thread,
            "a much longer follow-up question",
            TITLE_MIN_CHARS
        ));
    }

    #[test]
    fn assistant_only_history_still_counts_as_first() {
        let mut thread = empty_thread();
        thread.messages.push(Message::assistant("Welcome back"));
        assert!(should_infer_title(
            &thread,
            "what is a monad in simple terms",
            TITLE_MIN_CHARS
        ));
    }

    #[tokio::test]
    async fn infer_title_returns_summary_or_none() {
        let backend = ScriptedBackend::new().with_summary_title("Monads Explained");
        assert_eq!(
            infer_title(&backend, "what is a monad").await.as_deref(),
            Some("Monads Explained")
        );
        assert_eq!(backend.summary_requests(), vec!["what is a monad"]);

        let failing = ScriptedBackend::new().with_failing_summary();
        assert_eq!(infer_title(&failing, "what is a monad").await, None);
    }
}
