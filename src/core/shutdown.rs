//! # OS signal handling for the supervisor process.
//!
//! [`wait_for_shutdown_signal`] completes when the process is asked to terminate;
//! [`Supervisor::run_until_signal`](super::Supervisor::run_until_signal) then
//! stops the engine and drains subscribers.
//!
//! **Unix:** `SIGINT`, `SIGTERM` (systemd stop), `SIGQUIT`.
//! **Elsewhere:** Ctrl-C via [`tokio::signal::ctrl_c`].

/// Waits for a termination signal.
///
/// Returns `Err` if a signal handler cannot be registered.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => tracing::debug!("SIGINT"),
        _ = sigterm.recv() => tracing::debug!("SIGTERM"),
        _ = sigquit.recv() => tracing::debug!("SIGQUIT"),
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
