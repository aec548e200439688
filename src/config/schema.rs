//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the push
//! server. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the auto-push server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AutoPushConfig {
    /// Listener configuration (bind address, connection bound).
    pub listener: ListenerConfig,

    /// Static asset serving.
    pub assets: AssetsConfig,

    /// Push issuance settings.
    pub push: PushSettings,

    /// Dependency learner tuning.
    pub learner: LearnerConfig,

    /// Client cache-state token settings.
    pub token: TokenConfig,

    /// Session tracking settings.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

impl AutoPushConfig {
    /// Startup-only fields that differ between `self` and `next`.
    ///
    /// These are read once when the server starts; a reload leaves them at
    /// their startup values.
    pub fn startup_only_changes(&self, next: &AutoPushConfig) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.listener != next.listener {
            changed.push("listener");
        }
        if self.assets.root != next.assets.root {
            changed.push("assets.root");
        }
        if self.assets.cache_control != next.assets.cache_control {
            changed.push("assets.cache_control");
        }
        if self.token.cookie_name != next.token.cookie_name {
            changed.push("token.cookie_name");
        }
        if self.session != next.session {
            changed.push("session");
        }
        if self.observability != next.observability {
            changed.push("observability");
        }
        if self.admin != next.admin {
            changed.push("admin");
        }
        changed
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory assets are served from.
    pub root: PathBuf,

    /// URL prefix assets are mounted under ("/" for the whole site).
    pub prefix: String,

    /// Extensions that mark an entry document (no extension always does).
    pub entry_extensions: Vec<String>,

    /// `cache-control` value for served and pushed assets.
    pub cache_control: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./public"),
            prefix: "/".to_string(),
            entry_extensions: vec!["html".to_string(), "htm".to_string()],
            cache_control: "public, max-age=3600".to_string(),
        }
    }
}

/// Push issuance configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PushSettings {
    /// Master switch; when off, tokens are still maintained.
    pub enabled: bool,

    /// Maximum pushes per primary request.
    pub max_fan_out: usize,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_fan_out: 16,
        }
    }
}

/// Dependency learner configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LearnerConfig {
    /// How long after an entry request follow-ups are credited to it.
    pub learning_window_ms: u64,

    /// Minimum confidence before a dependency is pushed.
    pub push_threshold: u32,

    /// Confidence saturates here.
    pub max_confidence: u32,

    /// Confidence removed per failed observation.
    pub failure_penalty: u32,

    /// Edges kept per entry path.
    pub max_dependencies_per_entry: usize,

    /// Entry paths kept overall.
    pub max_entries: usize,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            learning_window_ms: 1_000,
            push_threshold: 3,
            max_confidence: 16,
            failure_penalty: 1,
            max_dependencies_per_entry: 32,
            max_entries: 4_096,
        }
    }
}

/// Cache-state token configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TokenConfig {
    /// Cookie carrying the token.
    pub cookie_name: String,

    /// Upper bound on the encoded token length.
    pub max_token_bytes: usize,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            cookie_name: "__ap_cache__".to_string(),
            max_token_bytes: 2_048,
        }
    }
}

/// Session tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions idle longer than this are dropped.
    pub idle_timeout_secs: u64,

    /// How often the reaper runs.
    pub reap_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,
            reap_interval_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
