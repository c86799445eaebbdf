//! # Supervisor: the runtime status state machine.
//!
//! The [`Supervisor`] is the single authority on whether the engine is stopped,
//! compiling, running, or being probed. The web layer holds an
//! `Arc<Supervisor>` and asks [`Supervisor::status`] before every state-changing
//! action.
//!
//! ## States
//! ```text
//!            start()                      status(): probe ok
//!   Stopped ─────────► Running ─────────► Unknown ─────────► Running
//!      ▲                  │                   │
//!      │   stop(): quit ok│                   │ probe failed
//!      ├──────────────────┘                   ▼
//!      ├───────────────────────────────── Stopped
//!      │
//!      │ job reached end-of-stream
//!   Compiling ◄──────── compile()   (from Stopped or Running; Running is stopped first)
//! ```
//!
//! ## Rules
//! - An active, non-terminal compilation makes `status()` return `Compiling`
//!   without touching the control port.
//! - `status()` re-verifies a `Running` belief with `exec_time()`; a failed probe
//!   demotes to `Stopped` exactly once and publishes `RuntimeLost`.
//! - A `Stopped` belief is never probed.
//! - While one caller probes, `status()` in other callers answers `Unknown` and
//!   does not probe again. State-changing operations and queries wait for that
//!   probe's result instead of acting on `Unknown`.
//! - Compilation never restarts the engine; `start()` must be called explicitly.
//! - The session lock is never held across an `.await`.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::process::Command as ProcessCommand;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::config::{CompileAdmission, SupervisorConfig};
use super::shutdown;
use super::status::{
    ENGINE_UNREACHABLE_TEXT, NOT_AVAILABLE_TEXT, NOT_RUNNING_TEXT, ProjectInfo, RuntimeStatus,
    ServiceSettings,
};
use crate::compile::{CompilationJob, CompileReport};
use crate::control::{Command, ControlClient, Service, display_time};
use crate::error::{ControlError, RuntimeError};
use crate::events::{Bus, Event, EventKind};

/// Number of units shown by [`Supervisor::exec_time`].
const EXEC_TIME_GRANULARITY: usize = 4;

/// What the supervisor believes about the engine process.
#[derive(Debug, Clone, Copy)]
enum EngineState {
    Stopped,
    Running { started_at: Instant },
    Probing { started_at: Instant },
}

/// Mutable session state, guarded by one mutex.
struct Session {
    engine: EngineState,
    project: ProjectInfo,
    job: Option<Arc<CompilationJob>>,
}

impl Session {
    fn compiling(&self) -> bool {
        self.job.as_ref().is_some_and(|job| !job.is_terminal())
    }

    fn last_known(&self) -> RuntimeStatus {
        if self.compiling() {
            return RuntimeStatus::Compiling;
        }
        match self.engine {
            EngineState::Stopped => RuntimeStatus::Stopped,
            EngineState::Running { .. } => RuntimeStatus::Running,
            EngineState::Probing { .. } => RuntimeStatus::Unknown,
        }
    }
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(|p| p.into_inner())
}

/// Puts `Running` back if a probe is abandoned (caller future dropped
/// mid-probe) and wakes callers waiting for it.
struct ProbeGuard<'a> {
    sup: &'a Supervisor,
    armed: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut s = self.sup.session();
            if let EngineState::Probing { started_at } = s.engine {
                s.engine = EngineState::Running { started_at };
            }
        }
        self.sup.probe_settled.notify_waiters();
    }
}

/// Owns the runtime session, the active compilation, and the event fan-out.
pub struct Supervisor {
    /// Supervisor configuration.
    cfg: SupervisorConfig,
    /// Event bus shared with compile jobs and readers.
    bus: Bus,
    /// Control-port client (stateless).
    client: ControlClient,
    /// Session state.
    session: Mutex<Session>,
    /// Cancels background tasks (listener, reapers) on shutdown.
    token: CancellationToken,
    /// Subscriber listener, taken on shutdown.
    listener: Mutex<Option<JoinHandle<()>>>,
    /// Signalled whenever an in-flight probe resolves or is abandoned.
    probe_settled: Notify,
}

impl Supervisor {
    /// Returns a builder for a supervisor with the given configuration.
    pub fn builder(cfg: SupervisorConfig) -> super::builder::SupervisorBuilder {
        super::builder::SupervisorBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: SupervisorConfig,
        bus: Bus,
        token: CancellationToken,
        listener: JoinHandle<()>,
    ) -> Self {
        let client = ControlClient::new(
            cfg.control_addr,
            cfg.connect_timeout_clamped(),
            cfg.io_timeout_clamped(),
        );
        Self {
            cfg,
            bus,
            client,
            session: Mutex::new(Session {
                engine: EngineState::Stopped,
                project: ProjectInfo::default(),
                job: None,
            }),
            token,
            listener: Mutex::new(Some(listener)),
            probe_settled: Notify::new(),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        lock(&self.session)
    }

    /// Configuration in use.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Control client, for callers that need raw exchanges.
    pub fn control(&self) -> &ControlClient {
        &self.client
    }

    /// New receiver for events published after this call (live viewers, tests).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    // ---- status ----------------------------------------------------------

    /// Current status, re-verifying a `Running` belief against the engine.
    ///
    /// Not a pure getter: a failed probe demotes the session to `Stopped`.
    pub async fn status(&self) -> RuntimeStatus {
        {
            let mut s = self.session();
            if s.compiling() {
                return RuntimeStatus::Compiling;
            }
            match s.engine {
                EngineState::Stopped => return RuntimeStatus::Stopped,
                EngineState::Probing { .. } => return RuntimeStatus::Unknown,
                EngineState::Running { started_at } => {
                    if self
                        .cfg
                        .startup_grace()
                        .is_some_and(|grace| started_at.elapsed() < grace)
                    {
                        return RuntimeStatus::Running;
                    }
                    s.engine = EngineState::Probing { started_at };
                }
            }
        }

        let mut guard = ProbeGuard {
            sup: self,
            armed: true,
        };
        let probe = self.client.send(Command::ExecTime).await;
        guard.armed = false;

        let status = self.settle_probe(probe);
        self.probe_settled.notify_waiters();
        status
    }

    /// Records a probe result, unless the session moved on meanwhile.
    fn settle_probe(&self, probe: Result<String, ControlError>) -> RuntimeStatus {
        let mut s = self.session();
        let EngineState::Probing { started_at } = s.engine else {
            // stop() acknowledged while the probe was in flight.
            return s.last_known();
        };
        match probe {
            Ok(_) => {
                s.engine = EngineState::Running { started_at };
                s.last_known()
            }
            Err(e) => {
                s.engine = EngineState::Stopped;
                let status = s.last_known();
                drop(s);
                tracing::warn!(error = %e, "runtime is not running");
                self.bus
                    .publish(Event::new(EventKind::RuntimeLost).with_reason(e.to_string()));
                status
            }
        }
    }

    /// Like [`status`](Self::status), but never `Unknown`: when another caller
    /// is probing, waits for that probe and takes its result.
    async fn settled_status(&self) -> RuntimeStatus {
        loop {
            let settled = self.probe_settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();

            match self.status().await {
                RuntimeStatus::Unknown => {}
                status => return status,
            }
            settled.await;
            match self.last_known() {
                RuntimeStatus::Unknown => continue,
                status => return status,
            }
        }
    }

    /// Last known status without probing the engine.
    pub fn last_known(&self) -> RuntimeStatus {
        self.session().last_known()
    }

    /// True when the engine is believed running (no probe).
    pub fn is_running(&self) -> bool {
        self.last_known() == RuntimeStatus::Running
    }

    // ---- engine lifecycle ------------------------------------------------

    /// Launches the engine when stopped. Returns the resulting status.
    ///
    /// Already running is not an error; compiling is [`RuntimeError::Busy`].
    /// A probe in flight is waited for, not refused.
    pub async fn start(&self) -> Result<RuntimeStatus, RuntimeError> {
        match self.settled_status().await {
            RuntimeStatus::Stopped => {}
            RuntimeStatus::Running => return Ok(RuntimeStatus::Running),
            status => {
                return Err(RuntimeError::Busy {
                    status,
                    action: "start",
                });
            }
        }

        let child = {
            let mut s = self.session();
            match s.last_known() {
                RuntimeStatus::Stopped => {}
                RuntimeStatus::Running => return Ok(RuntimeStatus::Running),
                status => {
                    return Err(RuntimeError::Busy {
                        status,
                        action: "start",
                    });
                }
            }

            let mut cmd = ProcessCommand::new(&self.cfg.engine_program);
            cmd.args(&self.cfg.engine_args).stdin(Stdio::null());
            if let Some(dir) = &self.cfg.working_dir {
                cmd.current_dir(dir);
            }
            let child = cmd.spawn().map_err(|source| RuntimeError::Spawn {
                program: self.cfg.engine_program.clone(),
                source,
            })?;
            s.engine = EngineState::Running {
                started_at: Instant::now(),
            };
            child
        };

        let pid = child.id();
        tracing::info!(?pid, program = %self.cfg.engine_program.display(), "runtime started");
        self.bus
            .publish(Event::new(EventKind::RuntimeStarted).with_pid(pid));
        self.spawn_engine_reaper(child, pid);
        Ok(RuntimeStatus::Running)
    }

    /// Observes the engine's exit without owning its lifetime.
    fn spawn_engine_reaper(&self, mut child: tokio::process::Child, pid: Option<u32>) {
        let bus = self.bus.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                res = child.wait() => {
                    let code = res.ok().and_then(|status| status.code());
                    tracing::debug!(?pid, ?code, "runtime process exited");
                    bus.publish(
                        Event::new(EventKind::RuntimeExited)
                            .with_pid(pid)
                            .with_exit_code(code),
                    );
                }
                _ = token.cancelled() => {}
            }
        });
    }

    /// Asks the engine to quit.
    ///
    /// Not running is a no-op; compiling is [`RuntimeError::Busy`]. If `quit()`
    /// cannot be delivered the status is left unchanged and
    /// [`RuntimeError::StopFailed`] is returned.
    pub async fn stop(&self) -> Result<(), RuntimeError> {
        match self.settled_status().await {
            RuntimeStatus::Running => {}
            RuntimeStatus::Stopped => return Ok(()),
            status => {
                return Err(RuntimeError::Busy {
                    status,
                    action: "stop",
                });
            }
        }

        match self.client.send(Command::Quit).await {
            Ok(_) => {
                {
                    // Also covers a probe started after our own check.
                    self.session().engine = EngineState::Stopped;
                }
                tracing::info!("runtime stopped");
                self.bus.publish(Event::new(EventKind::RuntimeStopped));
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to stop the runtime");
                self.bus.publish(
                    Event::new(EventKind::RuntimeStopFailed).with_reason(e.to_string()),
                );
                Err(RuntimeError::StopFailed(e))
            }
        }
    }

    // ---- compilation -----------------------------------------------------

    /// Starts compiling `source`, stopping the engine first if it is running.
    ///
    /// Overlapping requests follow [`SupervisorConfig::admission`].
    pub async fn compile(&self, source: impl AsRef<Path>) -> Result<(), RuntimeError> {
        let source = source.as_ref();
        match self.settled_status().await {
            RuntimeStatus::Compiling if self.cfg.admission == CompileAdmission::Reject => {
                return Err(RuntimeError::CompileInProgress);
            }
            RuntimeStatus::Running => {
                if let Err(e) = self.stop().await {
                    tracing::warn!(error = %e, "could not stop runtime before compiling");
                }
            }
            RuntimeStatus::Stopped | RuntimeStatus::Compiling | RuntimeStatus::Unknown => {}
        }

        let mut s = self.session();
        if s.compiling() {
            match self.cfg.admission {
                CompileAdmission::Reject => return Err(RuntimeError::CompileInProgress),
                CompileAdmission::Replace => {
                    tracing::warn!("superseding running compilation");
                    self.bus.publish(Event::new(EventKind::CompileSuperseded));
                }
            }
        }

        let job = CompilationJob::spawn(
            &self.cfg.compiler_program,
            &self.cfg.compiler_args,
            self.cfg.working_dir.as_deref(),
            source,
            self.bus.clone(),
        )?;
        s.job = Some(Arc::new(job));
        Ok(())
    }

    /// Cumulative output of the active (or last) compilation. Never blocks.
    ///
    /// Empty when nothing was compiled yet.
    pub fn poll_log_text(&self) -> String {
        let job = self.session().job.clone();
        job.map(|job| job.poll_output()).unwrap_or_default()
    }

    /// Outcome of the active (or last) compilation, once it finished.
    pub fn compile_report(&self) -> Option<CompileReport> {
        let job = self.session().job.clone();
        job.and_then(|job| job.report())
    }

    /// Active (or last) compilation job.
    pub fn compile_job(&self) -> Option<Arc<CompilationJob>> {
        self.session().job.clone()
    }

    // ---- project ---------------------------------------------------------

    /// Records metadata of the program about to be compiled or run.
    pub fn set_project(&self, project: ProjectInfo) {
        self.session().project = project;
    }

    /// Metadata of the current program.
    pub fn project(&self) -> ProjectInfo {
        self.session().project.clone()
    }

    // ---- queries ---------------------------------------------------------

    /// Execution time as text ("2 days, 3 hours"), `"N/A"` when not running.
    pub async fn exec_time(&self) -> String {
        if self.settled_status().await != RuntimeStatus::Running {
            return NOT_AVAILABLE_TEXT.to_string();
        }
        match self.client.exec_time_secs().await {
            Ok(secs) => display_time(secs, EXEC_TIME_GRANULARITY),
            Err(e) => {
                tracing::warn!(error = %e, "exec_time query failed");
                ENGINE_UNREACHABLE_TEXT.to_string()
            }
        }
    }

    /// Engine log text, or a status sentence when unavailable.
    pub async fn runtime_logs(&self) -> String {
        if self.settled_status().await != RuntimeStatus::Running {
            return NOT_RUNNING_TEXT.to_string();
        }
        match self.client.send(Command::RuntimeLogs).await {
            Ok(logs) => logs,
            Err(e) => {
                tracing::warn!(error = %e, "runtime_logs query failed");
                ENGINE_UNREACHABLE_TEXT.to_string()
            }
        }
    }

    // ---- fieldbus services -----------------------------------------------

    /// Starts the Modbus/TCP slave on `port`.
    pub async fn start_modbus(&self, port: u16) -> Result<(), RuntimeError> {
        self.enable_service(Service::Modbus, port.into()).await
    }

    /// Stops the Modbus/TCP slave. `port` is recorded in the event only.
    pub async fn stop_modbus(&self, port: u16) -> Result<(), RuntimeError> {
        self.disable_service(Service::Modbus, Some(port.into())).await
    }

    /// Starts the DNP3 outstation on `port`.
    pub async fn start_dnp3(&self, port: u16) -> Result<(), RuntimeError> {
        self.enable_service(Service::Dnp3, port.into()).await
    }

    /// Stops the DNP3 outstation. `port` is recorded in the event only.
    pub async fn stop_dnp3(&self, port: u16) -> Result<(), RuntimeError> {
        self.disable_service(Service::Dnp3, Some(port.into())).await
    }

    /// Starts the EtherNet/IP adapter on `port`.
    pub async fn start_enip(&self, port: u16) -> Result<(), RuntimeError> {
        self.enable_service(Service::Enip, port.into()).await
    }

    /// Stops the EtherNet/IP adapter.
    pub async fn stop_enip(&self) -> Result<(), RuntimeError> {
        self.disable_service(Service::Enip, None).await
    }

    /// Starts persistent storage, polling every `poll_secs` seconds.
    pub async fn start_pstorage(&self, poll_secs: u32) -> Result<(), RuntimeError> {
        self.enable_service(Service::Pstorage, poll_secs).await
    }

    /// Stops persistent storage.
    pub async fn stop_pstorage(&self) -> Result<(), RuntimeError> {
        self.disable_service(Service::Pstorage, None).await
    }

    /// Enables or disables every service according to persisted settings.
    ///
    /// All services are attempted; failures are returned, not short-circuited.
    pub async fn apply_services(&self, settings: &ServiceSettings) -> Vec<(Service, RuntimeError)> {
        let plan = [
            (Service::Modbus, settings.modbus_port.map(u32::from)),
            (Service::Dnp3, settings.dnp3_port.map(u32::from)),
            (Service::Enip, settings.enip_port.map(u32::from)),
            (Service::Pstorage, settings.pstorage_poll_secs),
        ];

        let mut failures = Vec::new();
        for (service, arg) in plan {
            let res = match arg {
                Some(arg) => self.enable_service(service, arg).await,
                None => self.disable_service(service, None).await,
            };
            if let Err(e) = res {
                failures.push((service, e));
            }
        }
        failures
    }

    /// Sends `start_<service>(arg)` when the engine is running.
    pub async fn enable_service(&self, service: Service, arg: u32) -> Result<(), RuntimeError> {
        self.toggle(Command::Start(service, arg), service, Some(arg), EventKind::ServiceEnabled)
            .await
    }

    /// Sends `stop_<service>()` when the engine is running.
    pub async fn disable_service(
        &self,
        service: Service,
        port: Option<u32>,
    ) -> Result<(), RuntimeError> {
        self.toggle(Command::Stop(service), service, port, EventKind::ServiceDisabled)
            .await
    }

    async fn toggle(
        &self,
        command: Command,
        service: Service,
        port: Option<u32>,
        kind: EventKind,
    ) -> Result<(), RuntimeError> {
        if self.settled_status().await != RuntimeStatus::Running {
            return Err(RuntimeError::NotRunning);
        }

        match self.client.send(command).await {
            Ok(_) => {
                tracing::info!(%service, ?port, %command, "service toggled");
                let mut ev = Event::new(kind).with_service(service.as_str());
                if let Some(port) = port {
                    ev = ev.with_port(port);
                }
                self.bus.publish(ev);
                Ok(())
            }
            Err(e) => {
                tracing::error!(%service, error = %e, "control command failed");
                self.bus.publish(
                    Event::new(EventKind::ControlFailed).with_reason(format!("{command}: {e}")),
                );
                Err(RuntimeError::Control(e))
            }
        }
    }

    // ---- shutdown --------------------------------------------------------

    /// Stops the engine if it is believed running, then stops background
    /// tasks and drains subscriber queues.
    pub async fn shutdown(&self) {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        if matches!(
            self.last_known(),
            RuntimeStatus::Running | RuntimeStatus::Unknown
        ) {
            if let Err(e) = self.stop().await {
                tracing::warn!(error = %e, "runtime left running at shutdown");
            }
        }

        self.token.cancel();
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = listener {
            let _ = handle.await;
        }
    }

    /// Waits for SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then shuts down.
    pub async fn run_until_signal(&self) -> std::io::Result<()> {
        shutdown::wait_for_shutdown_signal().await?;
        tracing::info!("shutdown signal received");
        self.shutdown().await;
        Ok(())
    }
}
