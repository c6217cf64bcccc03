// Signal handling module
//
// Supported signals:
// - SIGTERM: Stop accepting connections and exit
// - SIGINT:  Stop accepting connections and exit (Ctrl+C)

use crate::logger;

/// Wait for a termination signal and return a description of it (Unix only)
#[cfg(unix)]
pub async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let registered = signal(SignalKind::terminate())
        .and_then(|term| signal(SignalKind::interrupt()).map(|int| (term, int)));

    let (mut sigterm, mut sigint) = match registered {
        Ok(pair) => pair,
        Err(e) => {
            logger::log_error(&format!("Failed to register signal handlers: {e}"));
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM received",
        _ = sigint.recv() => "SIGINT received (Ctrl+C)",
    }
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub async fn shutdown_signal() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "Ctrl+C received",
        Err(e) => {
            logger::log_error(&format!("Failed to listen for Ctrl+C: {e}"));
            std::future::pending().await
        }
    }
}
