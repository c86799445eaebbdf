//! # plcvisor
//!
//! **plcvisor** supervises a soft-PLC runtime from the process that hosts its
//! web console.
//!
//! It launches and stops the engine process, talks to the engine's loopback
//! control port (`exec_time()`, `quit()`, `start_modbus(502)`, ...), runs the
//! program compiler in the background with its output streamed line by line,
//! and keeps one authoritative answer to "what is the runtime doing right now".
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                    web console (HTTP handlers)
//!                               │
//!                               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (runtime status state machine)                        │
//! │  - session: Stopped / Running / Probing, project, active job      │
//! │  - ControlClient (one TCP exchange per command, port 43628)       │
//! │  - Bus (broadcast events)                                         │
//! └──────┬──────────────────────────┬──────────────────────────┬──────┘
//!        │ spawn / quit()           │ spawn compiler           │
//!        ▼                          ▼                          │
//!   ┌──────────┐          ┌────────────────────┐               │
//!   │  engine  │          │  CompilationJob    │               │
//!   │ process  │          │  stdout+stderr ──► │               │
//!   └──────────┘          │  LogStreamReader   │               │
//!                         └─────────┬──────────┘               │
//!                                   │ CompileOutput, ...       │ RuntimeStarted, ...
//!                                   ▼                          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │              (capacity: SupervisorConfig::bus_capacity)           │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                            (per-sub queues)
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                      worker1   worker2   workerN
//! ```
//!
//! ### Status
//! ```text
//! status()
//!   ├─ active job not at end-of-stream ─► Compiling   (no network)
//!   ├─ believed Stopped                 ─► Stopped     (no network)
//!   ├─ another caller probing           ─► Unknown
//!   └─ believed Running:
//!        ├─ within startup grace        ─► Running
//!        └─ exec_time() probe
//!             ├─ Ok  ─► Running
//!             └─ Err ─► Stopped, publish RuntimeLost
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types                                   |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Engine lifecycle, status, services, compile orchestration.   | [`Supervisor`], [`RuntimeStatus`]           |
//! | **Control port**  | Typed commands over a one-shot TCP exchange.                 | [`ControlClient`], [`Command`], [`Service`] |
//! | **Compilation**   | Merged compiler output as a pollable, ordered line queue.    | [`CompilationJob`], [`LogStreamReader`]     |
//! | **Subscriber API**| Hook into runtime and compile events.                        | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for control exchanges and supervisor requests.  | [`ControlError`], [`RuntimeError`]          |
//! | **Configuration** | Endpoints, programs, timeouts, admission.                    | [`SupervisorConfig`]                        |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] that renders events through `tracing`.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use plcvisor::{RuntimeStatus, Supervisor, SupervisorConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = SupervisorConfig::default();
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn plcvisor::Subscribe>> = vec![Arc::new(plcvisor::LogWriter::default())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn plcvisor::Subscribe>> = Vec::new();
//!
//!     let sup = Supervisor::builder(cfg).with_subscribers(subs).build();
//!
//!     sup.compile("blink.st").await?;
//!     while sup.status().await == RuntimeStatus::Compiling {
//!         print!("{}", sup.poll_log_text());
//!         tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     }
//!     sup.start().await?;
//!     println!("up for {}", sup.exec_time().await);
//!
//!     sup.run_until_signal().await?;
//!     Ok(())
//! }
//! ```
mod compile;
mod control;
mod core;
mod error;
mod events;
mod subscribers;

// ---- Public re-exports ----

pub use compile::{
    CompilationJob, CompileOutcome, CompileReport, FINISHED_SUCCESSFULLY, FINISHED_WITH_ERRORS,
    LogLine, LogStreamReader, StreamEnd,
};
pub use control::{
    ACK_REPLY_BYTES, Command, ControlClient, EXEC_TIME_REPLY_BYTES, LOGS_REPLY_BYTES, Service,
    display_time,
};
pub use core::{
    CompileAdmission, DEFAULT_CONTROL_PORT, ENGINE_UNREACHABLE_TEXT, NOT_AVAILABLE_TEXT,
    NOT_RUNNING_TEXT, ProjectInfo, RuntimeStatus, ServiceSettings, Supervisor, SupervisorBuilder,
    SupervisorConfig,
};
pub use error::{ControlError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: built-in tracing subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
