//! # LogWriter — event renderer over `tracing`
//!
//! A minimal subscriber that renders incoming [`Event`]s as `tracing` records
//! under the `plcvisor` target. Install any `tracing` subscriber to see them.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO plcvisor: [runtime-started] pid=Some(4711)
//! INFO plcvisor: [compile-started] file="blink.st"
//! INFO plcvisor: [compile-output] Generating C files...
//! INFO plcvisor: [compile-finished] outcome="success"
//! WARN plcvisor: [runtime-lost] err="engine unreachable at 127.0.0.1:43628: connection refused"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::RuntimeStarted => {
                tracing::info!(target: "plcvisor", "[runtime-started] pid={:?}", e.pid);
            }
            EventKind::RuntimeStopped => {
                tracing::info!(target: "plcvisor", "[runtime-stopped]");
            }
            EventKind::RuntimeStopFailed => {
                tracing::error!(target: "plcvisor", "[runtime-stop-failed] err={reason:?}");
            }
            EventKind::RuntimeLost => {
                tracing::warn!(target: "plcvisor", "[runtime-lost] err={reason:?}");
            }
            EventKind::RuntimeExited => {
                tracing::info!(
                    target: "plcvisor",
                    "[runtime-exited] pid={:?} code={:?}", e.pid, e.exit_code
                );
            }
            EventKind::CompileStarted => {
                tracing::info!(target: "plcvisor", "[compile-started] file={reason:?}");
            }
            EventKind::CompileOutput => {
                let line = e.line.as_deref().unwrap_or("");
                tracing::info!(target: "plcvisor", "[compile-output] {}", line.trim_end());
            }
            EventKind::CompileFinished => {
                tracing::info!(target: "plcvisor", "[compile-finished] outcome={reason:?}");
            }
            EventKind::CompileStreamEnded => {
                tracing::warn!(target: "plcvisor", "[compile-stream-ended] reason={reason:?}");
            }
            EventKind::CompilerExited => {
                tracing::info!(target: "plcvisor", "[compiler-exited] code={:?}", e.exit_code);
            }
            EventKind::CompileSuperseded => {
                tracing::warn!(target: "plcvisor", "[compile-superseded]");
            }
            EventKind::ServiceEnabled => {
                tracing::info!(
                    target: "plcvisor",
                    "[service-enabled] service={:?} port={:?}", e.service, e.port
                );
            }
            EventKind::ServiceDisabled => {
                tracing::info!(target: "plcvisor", "[service-disabled] service={:?}", e.service);
            }
            EventKind::ControlFailed => {
                tracing::error!(target: "plcvisor", "[control-failed] err={reason:?}");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: "plcvisor", "[shutdown-requested]");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "plcvisor", "[subscriber-overflow] {reason}");
            }
            EventKind::CompileOutputSkipped => {
                tracing::warn!(
                    target: "plcvisor",
                    "[compile-output-skipped] lines={}", e.skipped.unwrap_or(0)
                );
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(target: "plcvisor", "[subscriber-panicked] {reason}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
