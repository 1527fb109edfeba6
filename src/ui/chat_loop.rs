//! Interactive line-based chat loop.
//!
//! One task owns the [`App`]: it reads stdin lines, applies actions reported by background
//! work, and renders the resulting [`crate::core::app::UiEvent`]s. Everything that touches
//! the network runs through the [`CommandExecutor`].

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::commands::{process_input, submit_result, CommandResult};
use crate::core::app::executor::{AppActionDispatcher, CommandExecutor};
use crate::core::app::{apply_actions, App, AppAction};
use crate::core::backend::{ChatBackend, HttpBackend};
use crate::core::config::Settings;
use crate::ui::render::Renderer;
use crate::utils::logging::TranscriptLog;

/// Route one line of user input: slash commands run immediately, anything else is sent as
/// a message on the active thread.
pub fn handle_input(app: &mut App, line: &str) -> CommandResult {
    match process_input(app, line) {
        CommandResult::ProcessAsMessage(text) => {
            let outcome = app.submit_message(&text);
            submit_result(app, outcome)
        }
        other => other,
    }
}

pub async fn run_chat(settings: Settings) -> Result<(), Box<dyn Error>> {
    let backend: Arc<dyn ChatBackend> = Arc::new(HttpBackend::new(
        settings.base_url.clone(),
        settings.connect_timeout,
    )?);
    let app = App::new(
        settings.title_min_chars,
        TranscriptLog::new(settings.log_file.clone()),
    );
    let stdin = BufReader::new(tokio::io::stdin());
    let mut renderer = Renderer::new(io::stdout());
    renderer.banner(&settings.base_url)?;
    run_event_loop(app, backend, stdin, &mut renderer).await
}

pub async fn run_event_loop<R, W>(
    mut app: App,
    backend: Arc<dyn ChatBackend>,
    input: R,
    renderer: &mut Renderer<W>,
) -> Result<(), Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<AppAction>();
    let executor = CommandExecutor::new(backend, AppActionDispatcher::new(action_tx));
    let mut lines = input.lines();
    let mut input_open = true;

    executor.execute_all(app.refresh_threads());

    loop {
        renderer.render_all(app.drain_ui_events())?;

        tokio::select! {
            line = lines.next_line(), if input_open => {
                match line? {
                    Some(line) => match handle_input(&mut app, &line) {
                        CommandResult::Quit => break,
                        CommandResult::Dispatch(commands) => executor.execute_all(commands),
                        CommandResult::Continue | CommandResult::ProcessAsMessage(_) => {}
                    },
                    None => {
                        debug!("Input closed");
                        input_open = false;
                    }
                }
            }
            Some(action) = action_rx.recv() => {
                let mut pending = vec![action];
                while let Ok(action) = action_rx.try_recv() {
                    pending.push(action);
                }
                let commands = apply_actions(&mut app, pending);
                executor.execute_all(commands);
            }
            else => break,
        }

        // With input closed, stay only until in-flight replies have landed.
        if !input_open && !app.has_active_streams() {
            break;
        }
    }

    renderer.render_all(app.drain_ui_events())?;
    executor.shutdown();
    info!("Chat session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::UiEvent;
    use crate::core::message::Message;
    use crate::utils::test_utils::{create_test_app, ScriptedBackend};

    async fn run_script(backend: ScriptedBackend, script: &str) -> String {
        let mut renderer = Renderer::new(Vec::new());
        run_event_loop(
            create_test_app(),
            Arc::new(backend),
            script.as_bytes(),
            &mut renderer,
        )
        .await
        .expect("event loop");
        String::from_utf8(renderer.into_inner()).expect("utf8")
    }

    #[test]
    fn message_input_starts_a_stream() {
        let mut app = create_test_app();
        let result = handle_input(&mut app, "hello");
        assert!(matches!(result, CommandResult::Dispatch(commands) if commands.len() == 1));
        assert_eq!(app.registry.active().messages, vec![Message::user("hello")]);
    }

    #[test]
    fn input_while_streaming_is_rejected_with_notice() {
        let mut app = create_test_app();
        handle_input(&mut app, "hello");
        let result = handle_input(&mut app, "again");
        assert!(matches!(result, CommandResult::Continue));
        assert!(matches!(
            app.drain_ui_events().last(),
            Some(UiEvent::Error(message)) if message.contains("still streaming")
        ));
        assert_eq!(app.registry.active().messages.len(), 1);
    }

    #[test]
    fn blank_line_is_ignored() {
        let mut app = create_test_app();
        assert!(matches!(
            handle_input(&mut app, "   "),
            CommandResult::Continue
        ));
        assert!(app.drain_ui_events().is_empty());
    }

    #[tokio::test]
    async fn reply_streams_before_exit_on_closed_input() {
        let output = run_script(ScriptedBackend::new(), "hello\n").await;
        assert!(output.contains("Assistant: Hello\n"), "output: {output}");
    }

    #[tokio::test]
    async fn stream_error_is_shown() {
        let backend = ScriptedBackend::new()
            .with_stream_chunks(vec!["data: {\"error\":\"model unavailable\"}\n"]);
        let output = run_script(backend, "hello\n").await;
        assert!(
            output.contains("❌ Error: model unavailable"),
            "output: {output}"
        );
    }

    #[tokio::test]
    async fn quit_stops_without_sending() {
        let backend = ScriptedBackend::new();
        let output = run_script(backend, "/quit\nnever sent\n").await;
        assert!(!output.contains("Assistant:"));
    }
}
