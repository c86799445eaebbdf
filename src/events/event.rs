//! # Runtime events emitted by the supervisor, the compiler pipeline and the control client.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Engine events**: runtime process lifecycle (start, stop, lost, exit)
//! - **Compile events**: compiler subprocess lifecycle and its output lines
//! - **Service events**: fieldbus sub-server toggles over the control port
//! - **Subscriber events**: delivery problems inside the fan-out
//!
//! The [`Event`] struct carries additional metadata such as timestamps, reasons,
//! output lines, ports and exit codes.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use plcvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ServiceEnabled)
//!     .with_service("modbus")
//!     .with_port(502u32);
//!
//! assert_eq!(ev.kind, EventKind::ServiceEnabled);
//! assert_eq!(ev.service, Some("modbus"));
//! assert_eq!(ev.port, Some(502));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: subscriber name and panic info
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: subscriber name and drop reason ("full", "closed")
    SubscriberOverflow,

    /// A subscriber's queue was full and compile output lines were dropped for it.
    ///
    /// Delivered only to that subscriber, ahead of its next event; never published on the bus.
    ///
    /// Sets:
    /// - `reason`: subscriber name
    /// - `skipped`: number of lines dropped since the last delivered line
    CompileOutputSkipped,

    // === Engine events ===
    /// Engine process was spawned; status is now `Running` (optimistic).
    ///
    /// Sets:
    /// - `pid`: OS process id, when available
    RuntimeStarted,

    /// Engine acknowledged `quit()`; status is now `Stopped`.
    RuntimeStopped,

    /// `quit()` could not be delivered; status unchanged.
    ///
    /// Sets:
    /// - `reason`: control error
    RuntimeStopFailed,

    /// Liveness probe failed while the engine was believed `Running`; demoted to `Stopped`.
    ///
    /// Sets:
    /// - `reason`: control error
    RuntimeLost,

    /// Engine child process exited (observed by the reaper task).
    ///
    /// Sets:
    /// - `pid`: OS process id, when available
    /// - `exit_code`: exit code, `None` when killed by a signal
    RuntimeExited,

    // === Compile events ===
    /// Compiler subprocess was spawned.
    ///
    /// Sets:
    /// - `reason`: source file path
    /// - `pid`: OS process id, when available
    CompileStarted,

    /// One line of merged compiler output (the live side channel).
    ///
    /// Sets:
    /// - `line`: the line text, including its trailing newline
    CompileOutput,

    /// A terminal phrase was observed.
    ///
    /// Sets:
    /// - `reason`: `"success"` or `"errors"`
    CompileFinished,

    /// Compiler output closed (or failed) before any terminal phrase.
    ///
    /// Sets:
    /// - `reason`: `"unexpected end of stream"` or the read error
    CompileStreamEnded,

    /// Compiler child process exited.
    ///
    /// Sets:
    /// - `exit_code`: exit code, `None` when killed by a signal
    CompilerExited,

    /// A new compile request replaced a still-running job.
    CompileSuperseded,

    // === Service events ===
    /// A fieldbus sub-server was enabled on the engine.
    ///
    /// Sets:
    /// - `service`: `"modbus"`, `"dnp3"`, `"enip"` or `"pstorage"`
    /// - `port`: listening port (polling seconds for `pstorage`)
    ServiceEnabled,

    /// A fieldbus sub-server was disabled on the engine.
    ///
    /// Sets:
    /// - `service`: service name
    /// - `port`: port supplied by the caller, when any
    ServiceDisabled,

    /// A control command was not delivered.
    ///
    /// Sets:
    /// - `reason`: command and control error
    ControlFailed,

    // === Shutdown events ===
    /// Shutdown requested (OS signal observed or explicit call).
    ShutdownRequested,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Human-readable reason (errors, outcomes, file paths).
    pub reason: Option<Arc<str>>,
    /// Output line (compile output only).
    pub line: Option<Arc<str>>,
    /// Fieldbus service name.
    pub service: Option<&'static str>,
    /// Port (or polling period) attached to a service toggle.
    pub port: Option<u32>,
    /// Child process id.
    pub pid: Option<u32>,
    /// Child exit code.
    pub exit_code: Option<i32>,
    /// Lines a subscriber missed (`CompileOutputSkipped` only).
    pub skipped: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            reason: None,
            line: None,
            service: None,
            port: None,
            pid: None,
            exit_code: None,
            skipped: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an output line.
    #[inline]
    pub fn with_line(mut self, line: impl Into<Arc<str>>) -> Self {
        self.line = Some(line.into());
        self
    }

    /// Attaches a service name.
    #[inline]
    pub fn with_service(mut self, service: &'static str) -> Self {
        self.service = Some(service);
        self
    }

    /// Attaches a port or polling period.
    #[inline]
    pub fn with_port(mut self, port: impl Into<u32>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// Attaches a process id (no-op for `None`).
    #[inline]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    /// Attaches an exit code (`None` = terminated by signal).
    #[inline]
    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates the gap marker for a subscriber that missed `lines` output lines.
    pub fn compile_output_skipped(subscriber: &'static str, lines: u64) -> Self {
        let mut ev = Event::new(EventKind::CompileOutputSkipped).with_reason(subscriber);
        ev.skipped = Some(lines);
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::RuntimeStarted);
        let b = Event::new(EventKind::RuntimeStopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_subscriber_overflow_reason() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));
    }

    #[test]
    fn test_builders_fill_fields() {
        let ev = Event::new(EventKind::CompilerExited)
            .with_pid(Some(42))
            .with_exit_code(Some(1));
        assert_eq!(ev.pid, Some(42));
        assert_eq!(ev.exit_code, Some(1));
        assert!(ev.line.is_none());
    }
}
