//! Cancellable periodic background task.

use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Runs a job repeatedly on a tokio task. Each run returns the delay before
/// the next one, or `None` to finish.
///
/// [`PeriodicTask::stop`] cancels a pending run and waits for one that is
/// already executing, so nothing is still running once it returns.
pub struct PeriodicTask {
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicTask {
    pub fn start<F, Fut>(first_delay: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Option<Duration>> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut delay = first_delay;
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = sleep(delay) => {}
                }
                if *stop_rx.borrow() {
                    break;
                }
                match job().await {
                    Some(next) => delay = next,
                    None => break,
                }
            }
            debug!("Periodic task finished");
        });

        Self {
            stop_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Cancels the schedule and waits for the task to exit. Idempotent.
    pub async fn stop(&self) {
        self.stop_tx.send_replace(true);
        let mut handle = self.handle.lock().await;
        if let Some(handle) = handle.take() {
            if let Err(e) = handle.await {
                warn!("Periodic task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        // Without an async context we can only signal; the task exits at its next check.
        self.stop_tx.send_replace(true);
    }
}
