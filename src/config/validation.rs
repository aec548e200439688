//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds, bounds, intervals)
//! - Validate addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AutoPushConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AutoPushConfig;

/// Smallest token bound that can hold any non-empty state.
const MIN_TOKEN_BYTES: usize = 64;

/// Browsers cap a single cookie at roughly 4 KiB.
const MAX_TOKEN_BYTES: usize = 4_000;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration, collecting every violation.
pub fn validate_config(config: &AutoPushConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }

    if !config.assets.prefix.starts_with('/') {
        errors.push(ValidationError::new("assets.prefix", "must start with '/'"));
    }
    if config.assets.prefix.contains("..") {
        errors.push(ValidationError::new("assets.prefix", "must not contain '..'"));
    }
    for ext in &config.assets.entry_extensions {
        if ext.is_empty() || ext.contains('.') || ext.contains('/') {
            errors.push(ValidationError::new(
                "assets.entry_extensions",
                format!("invalid extension {:?} (expected e.g. \"html\")", ext),
            ));
        }
    }

    if config.push.max_fan_out == 0 && config.push.enabled {
        errors.push(ValidationError::new(
            "push.max_fan_out",
            "must be > 0 while push is enabled",
        ));
    }

    let learner = &config.learner;
    if learner.learning_window_ms == 0 {
        errors.push(ValidationError::new("learner.learning_window_ms", "must be > 0"));
    }
    if learner.push_threshold == 0 {
        errors.push(ValidationError::new("learner.push_threshold", "must be > 0"));
    }
    if learner.max_confidence < learner.push_threshold {
        errors.push(ValidationError::new(
            "learner.max_confidence",
            format!(
                "must be >= push_threshold ({}), otherwise nothing is ever pushed",
                learner.push_threshold
            ),
        ));
    }
    if learner.failure_penalty == 0 {
        errors.push(ValidationError::new("learner.failure_penalty", "must be > 0"));
    }
    if learner.max_dependencies_per_entry == 0 {
        errors.push(ValidationError::new(
            "learner.max_dependencies_per_entry",
            "must be > 0",
        ));
    }
    if learner.max_entries == 0 {
        errors.push(ValidationError::new("learner.max_entries", "must be > 0"));
    }

    if config.token.cookie_name.is_empty()
        || !config
            .token
            .cookie_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        errors.push(ValidationError::new(
            "token.cookie_name",
            "must be non-empty and contain only [A-Za-z0-9_-]",
        ));
    }
    if !(MIN_TOKEN_BYTES..=MAX_TOKEN_BYTES).contains(&config.token.max_token_bytes) {
        errors.push(ValidationError::new(
            "token.max_token_bytes",
            format!("must be between {} and {}", MIN_TOKEN_BYTES, MAX_TOKEN_BYTES),
        ));
    }

    if config.session.idle_timeout_secs == 0 {
        errors.push(ValidationError::new("session.idle_timeout_secs", "must be > 0"));
    }
    if config.session.reap_interval_secs == 0 {
        errors.push(ValidationError::new("session.reap_interval_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set when the admin API is enabled",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            field,
            format!("invalid socket address {:?}", value),
        ));
    }
}
