//! Inactive session reclamation.
//!
//! # Responsibilities
//! - Periodically drop sessions whose transport vanished without a close
//! - Stop cleanly on shutdown

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::SessionConfig;
use crate::session::tracker::SessionTracker;

pub struct SessionReaper {
    tracker: Arc<SessionTracker>,
    config: SessionConfig,
}

impl SessionReaper {
    pub fn new(tracker: Arc<SessionTracker>, config: SessionConfig) -> Self {
        Self { tracker, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let idle_timeout = Duration::from_secs(self.config.idle_timeout_secs);
        let interval = Duration::from_secs(self.config.reap_interval_secs.max(1));

        tracing::info!(
            idle_timeout_secs = self.config.idle_timeout_secs,
            interval_secs = interval.as_secs(),
            "Session reaper starting"
        );

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reaped = self.tracker.reap_idle(idle_timeout);
                    if reaped > 0 {
                        tracing::debug!(
                            reaped,
                            remaining = self.tracker.len(),
                            "Reaped idle sessions"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Session reaper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetPath;
    use crate::lifecycle::Shutdown;
    use crate::session::SessionId;

    #[tokio::test(start_paused = true)]
    async fn reaps_idle_sessions_until_shutdown() {
        let tracker = Arc::new(SessionTracker::new());
        let id = SessionId::new();
        tracker.open(id);
        tracker.mark_requested(id, &AssetPath::root());

        let shutdown = Shutdown::new();
        let reaper = SessionReaper::new(
            tracker.clone(),
            SessionConfig {
                idle_timeout_secs: 10,
                reap_interval_secs: 5,
            },
        );
        let handle = tokio::spawn(reaper.run(shutdown.subscribe()));

        time::sleep(Duration::from_secs(16)).await;
        assert_eq!(tracker.len(), 0);

        shutdown.trigger();
        handle.await.unwrap();
    }
}
