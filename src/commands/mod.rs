//! Slash commands typed at the chat prompt.

mod registry;


pub use registry::{all_commands, matching_commands, CommandInvocation};

use crate::core::app::{App, AppCommand, SubmitError, UiEvent};

pub enum CommandResult {
    Continue,
    /// Background work for the executor.
    Dispatch(Vec<AppCommand>),
    ProcessAsMessage(String),
    Quit,
}

pub fn process_input(app: &mut App, input: &str) -> CommandResult {
    let trimmed = input.trim();

    let Some(rest) = trimmed.strip_prefix('/') else {
        return CommandResult::ProcessAsMessage(input.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    if let Some(command) = registry::find_command(command_name) {
        let invocation = CommandInvocation {
            input: trimmed,
            args,
        };
        return (command.handler)(app, invocation);
    }

    let suggestions: Vec<String> = matching_commands(command_name)
        .iter()
        .map(|command| format!("/{}", command.name))
        .collect();
    let message = if suggestions.is_empty() {
        format!("Unknown command /{command_name}. Type /help for a list of commands.")
    } else {
        format!(
            "Unknown command /{command_name}. Did you mean {}?",
            suggestions.join(" or ")
        )
    };
    app.push_ui_event(UiEvent::Error(message));
    CommandResult::Continue
}

/// Turn a submit outcome into a command result, surfacing rejections to the user.
pub fn submit_result(
    app: &mut App,
    outcome: Result<Vec<AppCommand>, SubmitError>,
) -> CommandResult {
    match outcome {
        Ok(commands) => CommandResult::Dispatch(commands),
        Err(SubmitError::EmptyMessage) => CommandResult::Continue,
        Err(err) => {
            app.push_ui_event(UiEvent::Error(err.to_string()));
            CommandResult::Continue
        }
    }
}

pub(super) fn handle_help(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let width = all_commands()
        .iter()
        .map(|command| command.usage.len())
        .max()
        .unwrap_or(0);
    let mut help = String::from("Commands:");
    for command in all_commands() {
        help.push_str(&format!("\n  {:width$}  {}", command.usage, command.help));
    }
    help.push_str("\nAnything else is sent as a message.");
    help.push_str(&format!(
        "\nTranscript logging: {}",
        app.transcript.get_status_string()
    ));
    app.push_ui_event(UiEvent::Info(help));
    CommandResult::Continue
}

pub(super) fn handle_new(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Dispatch(app.new_thread())
}

pub(super) fn handle_threads(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    app.show_thread_list();
    CommandResult::Dispatch(app.refresh_threads())
}

pub(super) fn handle_switch(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        app.push_ui_event(UiEvent::Error("Usage: /switch <n|id>".to_string()));
        return CommandResult::Continue;
    }
    match app.resolve_thread_ref(invocation.args) {
        Some(thread_id) if app.registry.is_active(&thread_id) => {
            app.push_ui_event(UiEvent::Info("Already in that conversation".to_string()));
            CommandResult::Continue
        }
        Some(thread_id) => CommandResult::Dispatch(app.switch_thread(thread_id)),
        None => {
            app.push_ui_event(UiEvent::Error(format!(
                "No conversation matches '{}'. Use /threads to list them.",
                invocation.args
            )));
            CommandResult::Continue
        }
    }
}

pub(super) fn handle_delete(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let target = if invocation.args.is_empty() {
        let active = app.registry.active_id().clone();
        if !app.registry.is_listed(&active) {
            app.push_ui_event(UiEvent::Info(
                "Nothing to delete: this conversation has not started yet".to_string(),
            ));
            return CommandResult::Continue;
        }
        active
    } else {
        match app.resolve_thread_ref(invocation.args) {
            Some(thread_id) => thread_id,
            None => {
                app.push_ui_event(UiEvent::Error(format!(
                    "No conversation matches '{}'. Use /threads to list them.",
                    invocation.args
                )));
                return CommandResult::Continue;
            }
        }
    };
    CommandResult::Dispatch(app.delete_thread(target))
}

pub(super) fn handle_history(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    app.show_history();
    CommandResult::Continue
}

pub(super) fn handle_title(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let active = app.registry.active();
    let message = format!("{} ({})", active.title, active.id);
    app.push_ui_event(UiEvent::Info(message));
    CommandResult::Continue
}

pub(super) fn handle_retry(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let outcome = app.retry_last_message();
    submit_result(app, outcome)
}

pub(super) fn handle_log(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let parts: Vec<&str> = invocation.input.split_whitespace().collect();

    let outcome = match parts.len() {
        1 => app.transcript.toggle_logging(),
        2 => app.transcript.set_log_file(parts[1].to_string()),
        _ => {
            app.push_ui_event(UiEvent::Error("Usage: /log [filename]".to_string()));
            return CommandResult::Continue;
        }
    };
    let event = match outcome {
        Ok(message) => UiEvent::Info(message),
        Err(e) => UiEvent::Error(format!("Log error: {e}")),
    };
    app.push_ui_event(event);
    CommandResult::Continue
}

pub(super) fn handle_quit(_app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Quit
}
