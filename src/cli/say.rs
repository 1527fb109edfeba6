//! One-shot "say" command: a single streamed reply without the interactive loop.

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use crate::core::backend::{ChatBackend, HttpBackend};
use crate::core::config::Settings;
use crate::core::session::ChatSessionClient;

pub async fn run_say(settings: &Settings, prompt: Vec<String>) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        return Err("Usage: synapse say <prompt>".into());
    }

    let backend: Arc<dyn ChatBackend> = Arc::new(HttpBackend::new(
        settings.base_url.clone(),
        settings.connect_timeout,
    )?);
    let mut stdout = io::stdout();
    say_with_backend(backend, &prompt, &mut stdout).await
}

/// Create a fresh server thread, send `prompt` on it, and write tokens to `out` as they
/// arrive.
pub async fn say_with_backend<W: Write>(
    backend: Arc<dyn ChatBackend>,
    prompt: &str,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let thread_id = backend.create_thread().await?;
    let client = ChatSessionClient::new(backend);

    let mut write_error = None;
    let result = client
        .send(&thread_id, prompt, |token| {
            if write_error.is_some() {
                return;
            }
            if let Err(err) = write!(out, "{token}").and_then(|_| out.flush()) {
                write_error = Some(err);
            }
        })
        .await;

    if let Some(err) = write_error {
        return Err(err.into());
    }
    match result {
        Ok(_) => {
            writeln!(out)?;
            Ok(())
        }
        Err(err) => {
            writeln!(out)?;
            Err(format!("❌ Error: {err}").into())
        }
    }
}
