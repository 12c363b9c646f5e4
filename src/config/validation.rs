//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and parseable fields (bind IP, semver requirement)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_ip.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_ip",
            format!("'{}' is not an IP address", config.listener.bind_ip),
        ));
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than zero",
        ));
    }

    if let Err(e) = semver::VersionReq::parse(&config.setup.runtime_requirement) {
        errors.push(ValidationError::new(
            "setup.runtime_requirement",
            format!("invalid semver requirement: {}", e),
        ));
    }

    if config.setup.max_body_size == 0 {
        errors.push(ValidationError::new(
            "setup.max_body_size",
            "must be greater than zero",
        ));
    }

    if config.site.title.trim().is_empty() {
        errors.push(ValidationError::new("site.title", "must not be empty"));
    }

    if config.site.locale.trim().is_empty() {
        errors.push(ValidationError::new("site.locale", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
