//! auto-push server.
//!
//! Serves a static directory over cleartext HTTP/2 and pushes the assets
//! each page has been observed to need.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                  AUTO-PUSH SERVER                 │
//!                      │                                                   │
//!   Client request     │  ┌──────────┐   ┌──────────┐   ┌──────────────┐  │
//!   ───────────────────┼─▶│   net    │──▶│   http   │──▶│     push     │  │
//!                      │  │ listener │   │  server  │   │    engine    │  │
//!                      │  └──────────┘   └────┬─────┘   └──┬────┬───┬──┘  │
//!                      │                      │            │    │   │     │
//!   Response + pushes  │                      ▼            ▼    ▼   ▼     │
//!   ◀──────────────────┼─────────────── files/push   token learner session│
//!                      │                                                   │
//!                      │  config (watcher) · observability · admin API     │
//!                      └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use auto_push::admin::{self, AdminState};
use auto_push::config::watcher::apply_updates;
use auto_push::config::{load_config, validate_config, AutoPushConfig, ConfigError, ConfigWatcher};
use auto_push::lifecycle::{shutdown_on_signal, Shutdown};
use auto_push::net::Listener;
use auto_push::observability::{logging, metrics};
use auto_push::session::SessionReaper;
use auto_push::{PushEngine, StaticServer};

#[derive(Parser, Clone)]
#[command(name = "auto-push-server")]
#[command(about = "HTTP/2 static server with adaptive server push", long_about = None)]
struct Args {
    /// TOML configuration file (hot-reloaded on change)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the asset root directory
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Serve files without pushing anything
    #[arg(long)]
    no_push: bool,
}

impl Args {
    fn apply(&self, config: &mut AutoPushConfig) {
        if let Some(port) = self.port {
            let host = config
                .listener
                .bind_address
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            config.listener.bind_address = format!("{}:{}", host, port);
        }
        if let Some(root) = &self.root {
            config.assets.root = root.clone();
        }
        if self.no_push {
            config.push.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => AutoPushConfig::default(),
    };
    args.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability.log_level);
    tracing::info!("auto-push v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        root = %config.assets.root.display(),
        prefix = %config.assets.prefix,
        push_enabled = config.push.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let engine = PushEngine::new(&config);

    let reaper = SessionReaper::new(engine.tracker().clone(), config.session.clone());
    tokio::spawn(reaper.run(shutdown.subscribe()));

    // Dropping the watcher stops file notifications, so keep it for the
    // lifetime of main.
    let _config_watcher = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let overrides = args.clone();
            tokio::spawn(apply_updates(
                engine.clone(),
                config.clone(),
                updates,
                shutdown.subscribe(),
                move |config: &mut AutoPushConfig| overrides.apply(config),
            ));
            Some(watcher.run()?)
        }
        None => None,
    };

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(engine.clone(), &config.admin);
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = admin::serve(admin_listener, state, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = Listener::bind(&config.listener).await?;
    let server = StaticServer::new(engine, &config);
    let server_task = tokio::spawn(server.run(listener, shutdown.clone()));

    shutdown_on_signal(&shutdown).await;
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
