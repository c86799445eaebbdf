//! Runtime status, project metadata and persisted service settings.

use std::fmt;

/// Text shown when the engine cannot be reached or answered nonsense.
pub const ENGINE_UNREACHABLE_TEXT: &str = "Error connecting to OpenPLC runtime";
/// Text shown for the execution time while the engine is not running.
pub const NOT_AVAILABLE_TEXT: &str = "N/A";
/// Text shown instead of engine logs while the engine is not running.
pub const NOT_RUNNING_TEXT: &str = "OpenPLC Runtime is not running";

/// Externally visible state of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeStatus {
    /// Engine not running, no compilation in flight.
    Stopped,
    /// Engine believed alive (confirmed by the last probe, or just started).
    Running,
    /// A compilation has not reached its terminal phrase yet.
    Compiling,
    /// A liveness probe is in flight; collapses to `Running` or `Stopped`.
    Unknown,
}

impl RuntimeStatus {
    /// Label used by the console ("Stopped", "Running", ...).
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeStatus::Stopped => "Stopped",
            RuntimeStatus::Running => "Running",
            RuntimeStatus::Compiling => "Compiling",
            RuntimeStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata of the program loaded (or being compiled) into the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectInfo {
    /// Program name as entered by the operator.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Structured-Text file name.
    pub file: String,
}

/// Fieldbus services as persisted by the console. `None` means disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Modbus/TCP slave port.
    pub modbus_port: Option<u16>,
    /// DNP3 outstation port.
    pub dnp3_port: Option<u16>,
    /// EtherNet/IP adapter port.
    pub enip_port: Option<u16>,
    /// Persistent-storage polling period, in seconds.
    pub pstorage_poll_secs: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels() {
        assert_eq!(RuntimeStatus::Stopped.to_string(), "Stopped");
        assert_eq!(RuntimeStatus::Running.to_string(), "Running");
        assert_eq!(RuntimeStatus::Compiling.to_string(), "Compiling");
        assert_eq!(RuntimeStatus::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_service_settings_default_disabled() {
        let s = ServiceSettings::default();
        assert!(s.modbus_port.is_none());
        assert!(s.dnp3_port.is_none());
        assert!(s.enip_port.is_none());
        assert!(s.pstorage_poll_secs.is_none());
    }
}
