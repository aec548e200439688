//! Hot reload of the configuration file.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::config::loader::load_config;
use crate::config::schema::AutoPushConfig;
use crate::push::PushEngine;

/// Watches one TOML file and emits every version of it that loads and
/// validates. Versions that fail are logged and skipped, so the running
/// configuration stays in place.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<AutoPushConfig>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<AutoPushConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. Notifications stop when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, update_tx } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "Config watch error");
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }

                match load_config(&watched) {
                    Ok(config) => {
                        tracing::debug!(path = %watched.display(), "Config change loaded");
                        let _ = update_tx.send(config);
                    }
                    Err(e) => {
                        tracing::error!(
                            path = %watched.display(),
                            error = %e,
                            "Rejected config change, keeping current configuration"
                        );
                    }
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }
}

/// Apply configuration updates to the engine until shutdown.
///
/// `adjust` runs on every update first, so startup overrides survive reloads.
/// Changes to startup-only fields (see [`AutoPushConfig::startup_only_changes`])
/// are reported and otherwise ignored.
pub async fn apply_updates<F>(
    engine: PushEngine,
    startup: AutoPushConfig,
    mut updates: mpsc::UnboundedReceiver<AutoPushConfig>,
    mut shutdown: broadcast::Receiver<()>,
    adjust: F,
) where
    F: Fn(&mut AutoPushConfig) + Send,
{
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(mut config) => {
                    adjust(&mut config);
                    let ignored = startup.startup_only_changes(&config);
                    if !ignored.is_empty() {
                        tracing::warn!(
                            fields = ?ignored,
                            "Config fields changed that only apply at startup; restart to use them"
                        );
                    }
                    engine.reload(&config);
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Config update loop stopped");
}
