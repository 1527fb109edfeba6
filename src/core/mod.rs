pub mod app;
pub mod backend;
pub mod chat_stream;
pub mod config;
pub mod constants;
pub mod message;
pub mod registry;
pub mod session;
pub mod thread_id;
pub mod title;
