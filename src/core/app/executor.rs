//! Runs [`AppCommand`]s as background tokio tasks. Tasks never touch [`super::App`]; they
//! report results as [`AppAction`]s through an [`AppActionDispatcher`].

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{AppAction, AppCommand};
use crate::core::backend::ChatBackend;
use crate::core::session::ChatSessionClient;
use crate::core::thread_id::ThreadId;
use crate::core::title::infer_title;

#[derive(Clone)]
pub struct AppActionDispatcher {
    tx: mpsc::UnboundedSender<AppAction>,
}

impl AppActionDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<AppAction>) -> Self {
        Self { tx }
    }

    pub fn dispatch(&self, action: AppAction) {
        // The receiver only goes away on shutdown.
        let _ = self.tx.send(action);
    }
}

pub struct CommandExecutor {
    backend: Arc<dyn ChatBackend>,
    sessions: ChatSessionClient,
    dispatcher: AppActionDispatcher,
    shutdown: CancellationToken,
}

impl CommandExecutor {
    pub fn new(backend: Arc<dyn ChatBackend>, dispatcher: AppActionDispatcher) -> Self {
        Self {
            sessions: ChatSessionClient::new(Arc::clone(&backend)),
            backend,
            dispatcher,
            shutdown: CancellationToken::new(),
        }
    }

    /// Abandon every in-flight task. Dropped stream futures release their threads.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn execute_all(&self, commands: impl IntoIterator<Item = AppCommand>) {
        for command in commands {
            self.execute(command);
        }
    }

    pub fn execute(&self, command: AppCommand) {
        match command {
            AppCommand::SpawnStream {
                thread_id,
                stream_id,
                message,
            } => self.spawn_stream(thread_id, stream_id, message),
            AppCommand::InferTitle { thread_id, text } => {
                let backend = Arc::clone(&self.backend);
                let dispatcher = self.dispatcher.clone();
                self.spawn(async move {
                    if let Some(title) = infer_title(backend.as_ref(), &text).await {
                        dispatcher.dispatch(AppAction::TitleInferred { thread_id, title });
                    }
                });
            }
            AppCommand::CreateThread { local_id } => {
                let backend = Arc::clone(&self.backend);
                let dispatcher = self.dispatcher.clone();
                self.spawn(async move {
                    let action = match backend.create_thread().await {
                        Ok(server_id) => AppAction::ThreadCreated {
                            local_id,
                            server_id,
                        },
                        Err(err) => AppAction::ThreadCreateFailed {
                            local_id,
                            error: err.to_string(),
                        },
                    };
                    dispatcher.dispatch(action);
                });
            }
            AppCommand::ListThreads => {
                let backend = Arc::clone(&self.backend);
                let dispatcher = self.dispatcher.clone();
                self.spawn(async move {
                    let action = match backend.list_threads().await {
                        Ok(ids) => AppAction::ThreadsListed { ids },
                        Err(err) => AppAction::ThreadsListFailed {
                            error: err.to_string(),
                        },
                    };
                    dispatcher.dispatch(action);
                });
            }
            AppCommand::FetchTitle { thread_id } => {
                let backend = Arc::clone(&self.backend);
                let dispatcher = self.dispatcher.clone();
                self.spawn(async move {
                    match backend.fetch_history(&thread_id).await {
                        Ok(state) => dispatcher.dispatch(AppAction::TitleLoaded {
                            thread_id,
                            title: state.title,
                        }),
                        Err(err) => {
                            debug!(thread_id = %thread_id, error = %err, "Title fetch failed");
                        }
                    }
                });
            }
            AppCommand::LoadThread { thread_id } => {
                let backend = Arc::clone(&self.backend);
                let dispatcher = self.dispatcher.clone();
                self.spawn(async move {
                    let action = match backend.fetch_history(&thread_id).await {
                        Ok(state) => AppAction::ThreadLoaded { state },
                        Err(err) => AppAction::ThreadLoadFailed {
                            thread_id,
                            error: err.to_string(),
                        },
                    };
                    dispatcher.dispatch(action);
                });
            }
            AppCommand::DeleteThread { thread_id } => {
                let backend = Arc::clone(&self.backend);
                let dispatcher = self.dispatcher.clone();
                self.spawn(async move {
                    let action = match backend.delete_thread(&thread_id).await {
                        Ok(()) => AppAction::ThreadDeleted { thread_id },
                        Err(err) => AppAction::ThreadDeleteFailed {
                            thread_id,
                            error: err.to_string(),
                        },
                    };
                    dispatcher.dispatch(action);
                });
            }
        }
    }

    fn spawn_stream(&self, thread_id: ThreadId, stream_id: u64, message: String) {
        let sessions = self.sessions.clone();
        let dispatcher = self.dispatcher.clone();
        self.spawn(async move {
            let token_dispatcher = dispatcher.clone();
            let token_thread = thread_id.clone();
            let result = sessions
                .send(&thread_id, &message, |token| {
                    token_dispatcher.dispatch(AppAction::StreamToken {
                        thread_id: token_thread.clone(),
                        stream_id,
                        token: token.to_string(),
                    });
                })
                .await;

            let action = match result {
                Ok(full_text) => AppAction::StreamCompleted {
                    thread_id,
                    stream_id,
                    full_text,
                },
                Err(err) => AppAction::StreamFailed {
                    thread_id,
                    stream_id,
                    message: err.to_string(),
                },
            };
            dispatcher.dispatch(action);
        });
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = task => {}
            }
        });
    }
}
