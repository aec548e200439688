//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AutoPushConfig (validated, immutable)
//!     → PushEngine::new / listener / admin
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → watcher.rs apply_updates → PushEngine::reload (atomic swap)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Startup-only fields: `[listener]`, `[admin]`, `[session]`,
//!   `[observability]`, `assets.root`, `assets.cache_control` and
//!   `token.cookie_name`. A reload that changes them logs a warning and
//!   keeps the startup values
//! - Reload applies `[push]`, `[learner]`, `assets.prefix`,
//!   `assets.entry_extensions` and `token.max_token_bytes`

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, AssetsConfig, AutoPushConfig, LearnerConfig, ListenerConfig,
    ObservabilityConfig, PushSettings, SessionConfig, TokenConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
