//! Synapse is a line-based terminal client for conversational AI threads.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the thread registry, the streaming decoder and session client, title
//!   inference, configuration, and the [`core::app::App`] state machine that ties them
//!   together.
//! - [`ui`] runs the interactive loop and renders app events as plain text.
//! - [`commands`] implements slash-command parsing and execution for the chat loop.
//! - [`api`] defines the wire payloads exchanged with the backend.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route through
//! [`crate::cli::main`], which dispatches into [`ui::chat_loop`] for interactive sessions
//! and into the one-shot subcommands otherwise.

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod ui;
pub mod utils;
