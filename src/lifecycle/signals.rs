//! OS signal handling.
//!
//! SIGINT and SIGTERM both move the shutdown signal to `Draining`. A repeated
//! signal is logged and otherwise ignored; the staged drain keeps going.

use crate::lifecycle::phase::{Phase, ShutdownSignal};

/// Wait for SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn wait_for_termination() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    };
    Ok(name)
}

/// Wait for Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_termination() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("CTRL-C")
}

/// Translate termination signals into `Draining` until the run finishes.
pub async fn listen(shutdown: ShutdownSignal) {
    loop {
        match wait_for_termination().await {
            Ok(name) => {
                tracing::warn!(signal = name, "Signal received");
                if !shutdown.advance(Phase::Draining) {
                    tracing::info!(phase = %shutdown.phase(), "Shutdown already in progress");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
                return;
            }
        }
    }
}
