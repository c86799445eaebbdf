//! # Subscribe: hook for consumers of supervisor events.
//!
//! Typical implementors are a live compile-log viewer (only `CompileOutput`
//! and the terminal events), an audit trail of start/stop requests, or the
//! built-in `LogWriter`.
//!
//! A subscriber is driven by its own worker task from a bounded queue, in
//! publication order. A panic in `on_event` is caught and published as
//! `SubscriberPanicked`; the worker keeps going with the next event.
//!
//! ```rust
//! use async_trait::async_trait;
//! use plcvisor::{Event, EventKind, Subscribe};
//!
//! struct Viewer;
//!
//! #[async_trait]
//! impl Subscribe for Viewer {
//!     async fn on_event(&self, ev: &Event) {
//!         match ev.kind {
//!             EventKind::CompileOutput => { /* append ev.line */ }
//!             EventKind::CompileOutputSkipped => { /* show "... N lines skipped" */ }
//!             _ => { /* terminal phrase seen, stream closed */ }
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "viewer" }
//!
//!     fn wants(&self, kind: EventKind) -> bool {
//!         matches!(
//!             kind,
//!             EventKind::CompileOutput | EventKind::CompileFinished | EventKind::CompileStreamEnded
//!         )
//!     }
//!
//!     fn queue_capacity(&self) -> usize { 4096 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

/// Consumer of supervisor events.
///
/// Implementations should not block the executor; errors are theirs to handle.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. Runs on the subscriber's worker task.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and in overflow, gap and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Whether events of `kind` are queued for this subscriber at all.
    ///
    /// Filtered kinds never take queue space. `CompileOutputSkipped` is
    /// delivered whenever `CompileOutput` is wanted.
    fn wants(&self, kind: EventKind) -> bool {
        let _ = kind;
        true
    }

    /// Queue capacity (at least 1). Size it for compile output bursts.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
