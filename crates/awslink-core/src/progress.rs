//! Transfer progress reporting.
//!
//! A [`TransferProgress`] is updated by the transfer itself; a
//! [`ProgressMonitor`] samples it on a background task and logs the percentage
//! until the transfer is done or the monitor is cancelled.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Default sampling interval.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Shared byte counters for one transfer.
#[derive(Debug, Default)]
pub struct TransferProgress {
    total: AtomicU64,
    transferred: AtomicU64,
    done: AtomicBool,
}

impl TransferProgress {
    /// A probe for a transfer of `total` bytes.
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self {
            total: AtomicU64::new(total),
            ..Self::default()
        }
    }

    /// Record `bytes` more transferred.
    pub fn add(&self, bytes: u64) {
        self.transferred.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Mark the transfer finished, successfully or not.
    pub fn finish(&self) {
        self.done.store(true, Ordering::Release);
    }

    /// Whether [`TransferProgress::finish`] has been called.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Bytes transferred so far.
    #[must_use]
    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    /// Total bytes.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Percentage transferred, clamped to `0.0..=100.0`. An empty transfer is
    /// complete.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_transferred(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 100.0;
        }
        (self.transferred() as f64 / total as f64 * 100.0).min(100.0)
    }
}

/// Background task logging a [`TransferProgress`].
///
/// Dropping the monitor cancels it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use awslink_core::{ProgressMonitor, TransferProgress};
///
/// # tokio_test::block_on(async {
/// let progress = Arc::new(TransferProgress::new(1024));
/// let monitor =
///     ProgressMonitor::spawn("backup.tar", Arc::clone(&progress), Duration::from_millis(10));
/// progress.add(1024);
/// progress.finish();
/// monitor.join().await;
/// assert!((progress.percent_transferred() - 100.0).abs() < f64::EPSILON);
/// # });
/// ```
#[derive(Debug)]
pub struct ProgressMonitor {
    cancel: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressMonitor {
    /// Start sampling `progress` every `interval`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(
        name: impl Into<String>,
        progress: Arc<TransferProgress>,
        interval: Duration,
    ) -> Self {
        let name = name.into();
        let (cancel_tx, mut cancel_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut cancel_rx => {
                        debug!(transfer = %name, "progress monitor cancelled");
                        break;
                    }
                    () = tokio::time::sleep(interval) => {
                        trace!(
                            transfer = %name,
                            percent = progress.percent_transferred(),
                            transferred = progress.transferred(),
                            total = progress.total(),
                            "transfer progress"
                        );
                        if progress.is_done() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            cancel: Some(cancel_tx),
            handle: Some(handle),
        }
    }

    /// Stop sampling. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    /// Cancel and wait for the task to exit.
    pub async fn join(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Whether the background task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
