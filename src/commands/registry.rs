use super::CommandResult;
use crate::core::app::App;

pub type CommandHandler = fn(&mut App, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub input: &'a str,
    pub args: &'a str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

/// Commands whose name starts with `prefix`, for hinting on typos.
pub fn matching_commands(prefix: &str) -> Vec<&'static Command> {
    let prefix = prefix.to_ascii_lowercase();
    all_commands()
        .iter()
        .filter(|command| command.name.starts_with(&prefix))
        .collect()
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "new",
        usage: "/new",
        help: "Start a new conversation.",
        handler: super::handle_new,
    },
    Command {
        name: "threads",
        usage: "/threads",
        help: "List conversations, most recent first.",
        handler: super::handle_threads,
    },
    Command {
        name: "switch",
        usage: "/switch <n|id>",
        help: "Open a conversation by list position or id prefix.",
        handler: super::handle_switch,
    },
    Command {
        name: "delete",
        usage: "/delete [n|id]",
        help: "Delete a conversation (the current one by default).",
        handler: super::handle_delete,
    },
    Command {
        name: "history",
        usage: "/history",
        help: "Reprint the current conversation.",
        handler: super::handle_history,
    },
    Command {
        name: "title",
        usage: "/title",
        help: "Show the current conversation's title.",
        handler: super::handle_title,
    },
    Command {
        name: "retry",
        usage: "/retry",
        help: "Resend your last message.",
        handler: super::handle_retry,
    },
    Command {
        name: "log",
        usage: "/log [file]",
        help: "Toggle transcript logging or set the log file path.",
        handler: super::handle_log,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Exit the chat.",
        handler: super::handle_quit,
    },
];
