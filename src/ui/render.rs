//! Plain-text rendering of [`UiEvent`]s for a line-based terminal.

use std::io::{self, Write};

use crate::core::app::{ThreadSummary, UiEvent};
use crate::core::message::{Message, Role};

const USER_PREFIX: &str = "You: ";
const ASSISTANT_PREFIX: &str = "Assistant: ";

pub struct Renderer<W: Write> {
    out: W,
    /// A streamed reply is being printed and its line is not terminated yet.
    reply_open: bool,
    /// Some text of the current reply has been printed.
    reply_started: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            reply_open: false,
            reply_started: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn banner(&mut self, base_url: &str) -> io::Result<()> {
        writeln!(self.out, "Connected to {base_url}. Type /help for commands.")?;
        self.out.flush()
    }

    pub fn render_all(&mut self, events: impl IntoIterator<Item = UiEvent>) -> io::Result<()> {
        for event in events {
            self.render(event)?;
        }
        self.out.flush()
    }

    pub fn render(&mut self, event: UiEvent) -> io::Result<()> {
        match event {
            UiEvent::Token(token) => self.write_reply_text(&token),
            UiEvent::ReplyFinished => {
                if !self.reply_started {
                    // Empty reply: still show that the turn happened.
                    write!(self.out, "{}", ASSISTANT_PREFIX.trim_end())?;
                    self.reply_open = true;
                }
                self.reply_started = false;
                self.close_reply()
            }
            UiEvent::ReplyFailed(message) => {
                self.reply_started = false;
                self.close_reply()?;
                writeln!(self.out, "❌ Error: {message}")
            }
            UiEvent::ThreadSwitched {
                id,
                title,
                messages,
                partial_reply,
            } => {
                self.reply_started = false;
                self.close_reply()?;
                writeln!(self.out, "── {title} ({id}) ──")?;
                self.write_messages(&messages)?;
                match partial_reply {
                    Some(text) => self.write_reply_text(&text),
                    None => Ok(()),
                }
            }
            UiEvent::TitleChanged { title, .. } => {
                self.close_reply()?;
                writeln!(self.out, "── {title} ──")
            }
            UiEvent::ThreadList(summaries) => {
                self.close_reply()?;
                self.write_thread_list(&summaries)
            }
            UiEvent::History(messages) => {
                self.close_reply()?;
                if messages.is_empty() {
                    writeln!(self.out, "(no messages yet)")
                } else {
                    self.write_messages(&messages)
                }
            }
            UiEvent::Info(message) => {
                self.close_reply()?;
                writeln!(self.out, "{message}")
            }
            UiEvent::Error(message) => {
                self.close_reply()?;
                writeln!(self.out, "❌ {message}")
            }
        }
    }

    fn write_reply_text(&mut self, text: &str) -> io::Result<()> {
        if !self.reply_open {
            write!(self.out, "{ASSISTANT_PREFIX}")?;
            self.reply_open = true;
        }
        self.reply_started = true;
        write!(self.out, "{text}")?;
        // Tokens should appear as they arrive.
        self.out.flush()
    }

    fn close_reply(&mut self) -> io::Result<()> {
        if self.reply_open {
            writeln!(self.out)?;
            self.reply_open = false;
        }
        Ok(())
    }

    fn write_messages(&mut self, messages: &[Message]) -> io::Result<()> {
        for message in messages {
            let prefix = match message.role {
                Role::User => USER_PREFIX,
                Role::Assistant => ASSISTANT_PREFIX,
            };
            writeln!(self.out, "{prefix}{}", message.content)?;
        }
        Ok(())
    }

    fn write_thread_list(&mut self, summaries: &[ThreadSummary]) -> io::Result<()> {
        if summaries.is_empty() {
            return writeln!(self.out, "No conversations yet.");
        }
        writeln!(self.out, "Conversations:")?;
        for (index, summary) in summaries.iter().enumerate() {
            let marker = if summary.is_active { '*' } else { ' ' };
            let streaming = if summary.is_streaming {
                " (replying…)"
            } else {
                ""
            };
            writeln!(
                self.out,
                "{marker} {:>2}. {}{streaming}  [{}]",
                index + 1,
                summary.title,
                summary.id
            )?;
        }
        Ok(())
    }
}
