//! Engine control port: typed commands, the one-shot client and duration formatting.
//!
//! - [`Command`], [`Service`]: the line-oriented vocabulary the engine understands
//! - [`ControlClient`]: one connection per request, explicit timeouts
//! - [`display_time`]: pure rendering of the engine's execution time

mod client;
mod command;
mod duration;

pub use client::ControlClient;
pub use command::{ACK_REPLY_BYTES, Command, EXEC_TIME_REPLY_BYTES, LOGS_REPLY_BYTES, Service};
pub use duration::display_time;
