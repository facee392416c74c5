//! Configuration file change notifier.
//!
//! Polls the files' modification times and asks for a reconciliation pass
//! when any of them changes (including appearing or disappearing).

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;

use crate::reconcile::ReloadTrigger;

pub struct ConfigWatcher {
    paths: Vec<PathBuf>,
    poll_interval: Duration,
    trigger: ReloadTrigger,
}

impl ConfigWatcher {
    pub fn new(paths: Vec<PathBuf>, poll_interval: Duration, trigger: ReloadTrigger) -> Self {
        Self {
            paths,
            poll_interval,
            trigger,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut last = modified_times(&self.paths).await;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Config watcher stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let current = modified_times(&self.paths).await;
                    if current != last {
                        tracing::info!("Configuration file changed, requesting reload");
                        self.trigger.reload_now();
                        last = current;
                    }
                }
            }
        }
    }
}

async fn modified_times(paths: &[PathBuf]) -> Vec<Option<SystemTime>> {
    let mut times = Vec::with_capacity(paths.len());
    for path in paths {
        let modified = tokio::fs::metadata(path)
            .await
            .ok()
            .and_then(|m| m.modified().ok());
        times.push(modified);
    }
    times
}
