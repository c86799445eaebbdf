//! # Event subscribers for the plcvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Supervisor / CompilationJob / LogStreamReader
//!        │ publish(Event)
//!        ▼
//!       Bus ──► subscriber_listener ──► SubscriberSet::emit(&Event)
//!                                           │
//!                                  ┌────────┼─────────┐
//!                                  ▼        ▼         ▼
//!                             LogWriter  live viewer  custom
//! ```

mod set;
mod subscriber;

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
