use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Cancellation token wired to SIGTERM/SIGINT for the scheduler daemon.
///
/// On the first signal the token is cancelled; the scheduler loop
/// observes it between cycles, so an in-flight reconcile cycle always
/// finishes and no record is left half-persisted.
pub fn install_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let handler_token = token.clone();

    tokio::spawn(async move {
        let signal_name = wait_for_signal().await;
        tracing::info!(
            signal = signal_name,
            "Shutdown requested, finishing the current reconcile cycle"
        );
        handler_token.cancel();
    });

    token
}

async fn wait_for_signal() -> &'static str {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}
