//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`] centralized settings for the runtime supervisor:
//! where the engine's control port lives, how the engine and compiler are
//! launched, and how patient the supervisor is with them.
//!
//! ## Sentinel values
//! - `startup_grace = 0s` → probe liveness immediately after `start()`
//! - `connect_timeout` / `io_timeout` are clamped to at least 1 ms by the client accessors

use std::ffi::OsString;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;

/// Fixed control port of the engine.
pub const DEFAULT_CONTROL_PORT: u16 = 43628;

/// What `compile()` does while another compilation is still running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompileAdmission {
    /// Refuse the new request with `RuntimeError::CompileInProgress`.
    #[default]
    Reject,

    /// Abandon the running job and start the new one. The old job's output is
    /// no longer reachable; its reader drains to EOF in the background.
    Replace,
}

/// Configuration for the runtime supervisor.
///
/// ## Field semantics
/// - `control_addr`: engine control endpoint (loopback; no authentication)
/// - `connect_timeout`, `io_timeout`: bounds for every control exchange
/// - `engine_program` / `engine_args`: how to launch the engine
/// - `compiler_program` / `compiler_args`: how to launch the compiler (the source file is appended)
/// - `working_dir`: directory both children run in (`None` = inherit)
/// - `startup_grace`: time after `start()` during which status is not probed
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `admission`: policy for overlapping compile requests
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Engine control endpoint.
    pub control_addr: SocketAddr,

    /// Maximum time to establish a control connection.
    pub connect_timeout: Duration,

    /// Maximum time for each write/read on a control connection.
    pub io_timeout: Duration,

    /// Engine executable, spawned with `engine_args` only.
    pub engine_program: PathBuf,

    /// Arguments passed to the engine (empty by default).
    pub engine_args: Vec<OsString>,

    /// Compiler executable.
    pub compiler_program: PathBuf,

    /// Arguments passed before the source file path.
    pub compiler_args: Vec<OsString>,

    /// Working directory for both children.
    pub working_dir: Option<PathBuf>,

    /// Startup grace period before the first liveness probe.
    ///
    /// The console historically waited one second after launching the engine
    /// before talking to it.
    pub startup_grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Policy for a compile request arriving while one is in flight.
    pub admission: CompileAdmission,
}

impl SupervisorConfig {
    /// Returns the startup grace as an `Option` (`None` = probe immediately).
    #[inline]
    pub fn startup_grace(&self) -> Option<Duration> {
        if self.startup_grace.is_zero() {
            None
        } else {
            Some(self.startup_grace)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Connect timeout clamped to a minimum of 1 ms.
    #[inline]
    pub fn connect_timeout_clamped(&self) -> Duration {
        self.connect_timeout.max(Duration::from_millis(1))
    }

    /// I/O timeout clamped to a minimum of 1 ms.
    #[inline]
    pub fn io_timeout_clamped(&self) -> Duration {
        self.io_timeout.max(Duration::from_millis(1))
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `control_addr = 127.0.0.1:43628`
    /// - `connect_timeout = 3s`, `io_timeout = 3s`
    /// - `engine_program = ./core/openplc`, no arguments
    /// - `compiler_program = ./scripts/compile_program.sh`
    /// - `startup_grace = 1s`
    /// - `bus_capacity = 1024`
    /// - `admission = CompileAdmission::Reject`
    fn default() -> Self {
        Self {
            control_addr: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::LOCALHOST,
                DEFAULT_CONTROL_PORT,
            )),
            connect_timeout: Duration::from_secs(3),
            io_timeout: Duration::from_secs(3),
            engine_program: PathBuf::from("./core/openplc"),
            engine_args: Vec::new(),
            compiler_program: PathBuf::from("./scripts/compile_program.sh"),
            compiler_args: Vec::new(),
            working_dir: None,
            startup_grace: Duration::from_secs(1),
            bus_capacity: 1024,
            admission: CompileAdmission::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SupervisorConfig::default();
        assert_eq!(cfg.control_addr.port(), DEFAULT_CONTROL_PORT);
        assert!(cfg.control_addr.ip().is_loopback());
        assert_eq!(cfg.admission, CompileAdmission::Reject);
        assert_eq!(cfg.startup_grace(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_sentinels() {
        let cfg = SupervisorConfig {
            startup_grace: Duration::ZERO,
            bus_capacity: 0,
            io_timeout: Duration::ZERO,
            ..SupervisorConfig::default()
        };
        assert_eq!(cfg.startup_grace(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.io_timeout_clamped(), Duration::from_millis(1));
    }
}
