//! Line-based terminal front end.
//!
//! - [`chat_loop`]: the interaction loop that routes input through [`crate::commands`] and
//!   coordinates background work via [`crate::core::app::executor`].
//! - [`render`]: plain-text output of the events the app produces.

pub mod chat_loop;
pub mod render;
