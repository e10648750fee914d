//! Server-wide stop signal.
//!
//! One root [`CancellationToken`] is shared by the HTTP listener, the list
//! stream and every publisher session (which hold child tokens). Stopping
//! the server cancels the root and then drains the caller's task handles.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long [`ShutdownCoordinator::graceful_shutdown`] waits when no timeout is given.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owner of the root stop token.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Coordinator with a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on the root token.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the root token. Idempotent.
    pub fn shutdown(&self) {
        if self.token.is_cancelled() {
            return;
        }
        info!("shutdown requested");
        self.token.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop the server and wait for `handles`.
    ///
    /// Tasks still running when the deadline passes are aborted.
    pub async fn graceful_shutdown(&self, handles: Vec<JoinHandle<()>>, timeout: Option<Duration>) {
        self.shutdown();
        let deadline = Instant::now() + timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        let report = drain(handles, deadline).await;
        if report.aborted > 0 {
            warn!(
                finished = report.finished,
                panicked = report.panicked,
                aborted = report.aborted,
                "drain deadline passed, aborted remaining tasks"
            );
        } else {
            info!(finished = report.finished, panicked = report.panicked, "server drained");
        }
    }
}

// ─── Draining ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq, Eq)]
struct DrainReport {
    finished: usize,
    panicked: usize,
    aborted: usize,
}

async fn drain(handles: Vec<JoinHandle<()>>, deadline: Instant) -> DrainReport {
    let mut report = DrainReport::default();
    for mut handle in handles {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Err(e)) if e.is_panic() => {
                debug!(error = %e, "task panicked during drain");
                report.panicked += 1;
            }
            Ok(_) => report.finished += 1,
            Err(_) => {
                handle.abort();
                report.aborted += 1;
            }
        }
    }
    report
}
