//! Runtime core: the supervisor and its configuration.
//!
//! Internal modules:
//! - [`supervisor`]: the runtime status state machine and every console-facing operation;
//! - [`builder`]: wires the bus, the subscriber listener and the supervisor;
//! - [`config`]: endpoints, programs, timeouts, admission policy;
//! - [`status`]: status values, project metadata, persisted service settings;
//! - [`shutdown`]: OS signal handling.

mod builder;
mod config;
mod shutdown;
mod status;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::{CompileAdmission, DEFAULT_CONTROL_PORT, SupervisorConfig};
pub use status::{
    ENGINE_UNREACHABLE_TEXT, NOT_AVAILABLE_TEXT, NOT_RUNNING_TEXT, ProjectInfo, RuntimeStatus,
    ServiceSettings,
};
pub use supervisor::Supervisor;
