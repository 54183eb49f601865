//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check the configuration, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "server.bind_address", &config.server.bind_address);
    check_positive(&mut errors, "server.request_timeout_secs", config.server.request_timeout_secs);
    if config.server.max_body_bytes == 0 {
        errors.push(ValidationError::new("server.max_body_bytes", "must be greater than 0"));
    }

    if config.coordination.enabled {
        if config.coordination.endpoints.is_empty() {
            errors.push(ValidationError::new(
                "coordination.endpoints",
                "at least one endpoint is required when coordination is enabled",
            ));
        }
        for (i, endpoint) in config.coordination.endpoints.iter().enumerate() {
            check_endpoint(&mut errors, &format!("coordination.endpoints[{}]", i), endpoint);
        }
        check_positive(&mut errors, "coordination.dial_timeout_secs", config.coordination.dial_timeout_secs);
    }

    check_positive(&mut errors, "lifecycle.shutdown_timeout_ms", config.lifecycle.shutdown_timeout_ms);
    check_positive(&mut errors, "lifecycle.startup_timeout_ms", config.lifecycle.startup_timeout_ms);

    if config.observability.metrics_enabled {
        check_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if let Err(e) = value.parse::<SocketAddr>() {
        errors.push(ValidationError::new(field, format!("invalid address `{}`: {}", value, e)));
    }
}

/// `host:port`, where host may be a name that is resolved at dial time.
fn check_endpoint(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    let valid = match value.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    };
    if !valid {
        errors.push(ValidationError::new(field, format!("expected host:port, got `{}`", value)));
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be greater than 0"));
    }
}
