//! # Control-port commands.
//!
//! The engine understands one flat text command per connection, terminated by
//! a newline, and answers with a single reply. [`Command`] is the typed form of
//! that vocabulary; [`Command::wire`] renders the exact text sent.
//!
//! ```text
//! exec_time()          → seconds since the engine started, as decimal text
//! quit()               → engine shuts down
//! start_modbus(502)    → start the Modbus/TCP slave on port 502
//! stop_modbus()        → stop it
//! start_dnp3(20000)    → start the DNP3 outstation
//! stop_dnp3()
//! start_enip(44818)    → start the EtherNet/IP adapter
//! stop_enip()
//! start_pstorage(10)   → persist retained variables every 10 s
//! stop_pstorage()
//! runtime_logs()       → the engine's log buffer
//! ```

use std::fmt;

/// Default reply limit for commands that only acknowledge.
pub const ACK_REPLY_BYTES: usize = 1_000;
/// Reply limit for `exec_time()`.
pub const EXEC_TIME_REPLY_BYTES: usize = 10_000;
/// Reply limit for `runtime_logs()`.
pub const LOGS_REPLY_BYTES: usize = 1_000_000;

/// Fieldbus sub-servers hosted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Modbus/TCP slave.
    Modbus,
    /// DNP3 outstation.
    Dnp3,
    /// EtherNet/IP adapter.
    Enip,
    /// Persistent storage of retained variables (parameter is a polling period).
    Pstorage,
}

impl Service {
    /// Stable lowercase name, also the command suffix.
    pub fn as_str(self) -> &'static str {
        match self {
            Service::Modbus => "modbus",
            Service::Dnp3 => "dnp3",
            Service::Enip => "enip",
            Service::Pstorage => "pstorage",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single control-port request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Liveness probe; the reply is the execution time in seconds.
    ExecTime,
    /// Ask the engine to exit.
    Quit,
    /// Start a fieldbus sub-server with its port (or polling period).
    Start(Service, u32),
    /// Stop a fieldbus sub-server.
    Stop(Service),
    /// Fetch the engine's log text.
    RuntimeLogs,
}

impl Command {
    /// Exact text written to the socket (without the trailing newline).
    pub fn wire(&self) -> String {
        match self {
            Command::ExecTime => "exec_time()".to_string(),
            Command::Quit => "quit()".to_string(),
            Command::Start(service, arg) => format!("start_{service}({arg})"),
            Command::Stop(service) => format!("stop_{service}()"),
            Command::RuntimeLogs => "runtime_logs()".to_string(),
        }
    }

    /// Maximum number of reply bytes read for this command.
    pub fn reply_limit(&self) -> usize {
        match self {
            Command::ExecTime => EXEC_TIME_REPLY_BYTES,
            Command::RuntimeLogs => LOGS_REPLY_BYTES,
            _ => ACK_REPLY_BYTES,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire())
    }
}
