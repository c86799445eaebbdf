//! Error types used by the plcvisor supervisor and its control client.
//!
//! This module defines two main error enums:
//!
//! - [`ControlError`] — failures of a single control-port exchange with the engine.
//! - [`RuntimeError`] — failures of supervisor operations (start/stop/compile/toggles).
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! A [`ControlError`] is never fatal: callers treat it as "engine not reachable".

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::RuntimeStatus;

/// # Errors produced by a control-port exchange.
///
/// Every connect/write/read failure maps to [`ControlError::Unreachable`] or
/// [`ControlError::TimedOut`]; both mean the engine could not be reached.
/// [`ControlError::MalformedReply`] is raised by callers that parse the reply.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// Connection refused, reset, or any other I/O failure.
    #[error("engine unreachable at {addr}: {reason}")]
    Unreachable {
        /// Control endpoint that was dialed.
        addr: SocketAddr,
        /// Underlying I/O failure, rendered.
        reason: String,
    },

    /// Connect or read did not complete within the configured timeout.
    #[error("engine at {addr} did not answer within {after:?}")]
    TimedOut {
        /// Control endpoint that was dialed.
        addr: SocketAddr,
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The engine answered, but the reply could not be interpreted.
    #[error("malformed reply to {command}: {reply:?}")]
    MalformedReply {
        /// Command text that was sent.
        command: String,
        /// Raw reply text.
        reply: String,
    },
}

impl ControlError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use plcvisor::ControlError;
    ///
    /// let err = ControlError::Unreachable {
    ///     addr: "127.0.0.1:43628".parse().unwrap(),
    ///     reason: "connection refused".into(),
    /// };
    /// assert_eq!(err.as_label(), "control_unreachable");
    /// assert!(err.is_unreachable());
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ControlError::Unreachable { .. } => "control_unreachable",
            ControlError::TimedOut { .. } => "control_timed_out",
            ControlError::MalformedReply { .. } => "control_malformed_reply",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ControlError::Unreachable { addr, reason } => format!("unreachable {addr}: {reason}"),
            ControlError::TimedOut { addr, after } => format!("timeout {addr} after {after:?}"),
            ControlError::MalformedReply { command, reply } => {
                format!("malformed reply to {command}: {reply:?}")
            }
        }
    }

    /// True when the failure means "engine not reachable" (as opposed to a bad reply).
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ControlError::Unreachable { .. } | ControlError::TimedOut { .. }
        )
    }
}

/// # Errors produced by supervisor operations.
///
/// None of these are fatal to the supervisor; the web layer renders them as
/// status text.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A child process (engine or compiler) could not be spawned.
    #[error("failed to spawn {program:?}: {source}")]
    Spawn {
        /// Program that was launched.
        program: PathBuf,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// The quit command could not be delivered; the engine is presumed still running.
    #[error("failed to stop the runtime: {0}")]
    StopFailed(#[source] ControlError),

    /// A compilation is still in flight and the admission policy rejects another one.
    #[error("a compilation is already in progress")]
    CompileInProgress,

    /// The requested transition is not allowed from the current status.
    #[error("runtime is {status}, cannot {action}")]
    Busy {
        /// Status observed when the request arrived.
        status: RuntimeStatus,
        /// Requested action.
        action: &'static str,
    },

    /// The engine must be running for this operation.
    #[error("runtime is not running")]
    NotRunning,

    /// The engine did not accept a control command.
    #[error(transparent)]
    Control(#[from] ControlError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use plcvisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::CompileInProgress.as_label(), "runtime_compile_in_progress");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Spawn { .. } => "runtime_spawn_failed",
            RuntimeError::StopFailed(_) => "runtime_stop_failed",
            RuntimeError::CompileInProgress => "runtime_compile_in_progress",
            RuntimeError::Busy { .. } => "runtime_busy",
            RuntimeError::NotRunning => "runtime_not_running",
            RuntimeError::Control(e) => e.as_label(),
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::Spawn { program, source } => format!("spawn {program:?}: {source}"),
            RuntimeError::StopFailed(e) => format!("stop failed: {}", e.as_message()),
            RuntimeError::CompileInProgress => "compile in progress".to_string(),
            RuntimeError::Busy { status, action } => format!("{action} refused while {status}"),
            RuntimeError::NotRunning => "not running".to_string(),
            RuntimeError::Control(e) => e.as_message(),
        }
    }
}
