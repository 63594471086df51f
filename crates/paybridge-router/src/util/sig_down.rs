//! Shutdown on SIGTERM and SIGINT.
//!
//! The HTTP server and the expiry sweeper both watch the same
//! [`CancellationToken`]; whichever signal arrives first cancels it.
//!
//! ```ignore
//! let sig_down = SigDown::try_new()?;
//! sweeper.spawn(&tasks, sig_down.cancellation_token());
//! axum::serve(listener, app)
//!     .with_graceful_shutdown(sig_down.cancellation_token().cancelled_owned())
//!     .await?;
//! ```

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub struct SigDown {
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl SigDown {
    /// Installs the signal handlers. Fails if either signal cannot be registered.
    pub fn try_new() -> Result<Self, std::io::Error> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let cancellation_token = CancellationToken::new();
        let task_tracker = TaskTracker::new();
        let token = cancellation_token.clone();
        task_tracker.spawn(async move {
            let received = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
                _ = token.cancelled() => return,
            };
            tracing::info!(signal = received, "Shutting down");
            token.cancel();
        });
        task_tracker.close();
        Ok(Self {
            task_tracker,
            cancellation_token,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Waits until shutdown is requested and the signal task has finished.
    pub async fn recv(&self) {
        self.cancellation_token.cancelled().await;
        self.task_tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_releases_waiters() {
        let sig_down = SigDown::try_new().unwrap();
        let token = sig_down.cancellation_token();
        assert!(!token.is_cancelled());
        token.cancel();
        sig_down.recv().await;
        assert!(sig_down.cancellation_token().is_cancelled());
    }
}
