//! Background expiration sweep

use crate::service::EnhancementService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Periodically runs [`EnhancementService::run_maintenance`]
#[derive(Debug)]
pub struct ExpirationSweeper;

impl ExpirationSweeper {
    /// Start sweeping every `interval`; the first sweep runs after one interval
    #[must_use]
    pub fn spawn(service: Arc<EnhancementService>, interval: Duration) -> SweeperHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = service.run_maintenance().await;
                        debug!(
                            expired = report.previews_expired,
                            purged = report.previews_purged,
                            rollback_points = report.rollback_points_removed,
                            "Sweep complete"
                        );
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Expiration sweeper stopped");
        });
        SweeperHandle { stop: stop_tx, task }
    }
}

/// Handle to a running sweeper
#[derive(Debug)]
pub struct SweeperHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper and wait for its current pass to finish
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Expiration sweeper task failed");
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
