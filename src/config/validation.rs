//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, sizes >= 1)
//! - Keep the fallback delay below every real-call timeout so the race
//!   always has a winner before the slowest call gives up
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: config → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::config::schema::{BalancerConfig, GatewayConfig, PLACEHOLDER_API_KEY};

/// A single semantic problem in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no strategies configured: need at least one processor or fallback")]
    NoStrategies,

    #[error("processor name must not be empty")]
    EmptyProcessorName,

    #[error("duplicate processor name '{0}'")]
    DuplicateProcessor(String),

    #[error("invalid URL '{url}' for {owner}")]
    InvalidUrl { owner: String, url: String },

    #[error("{0} must be greater than zero")]
    Zero(String),

    #[error("fallback '{tag}' delay {delay_ms}ms must be shorter than the smallest call timeout {timeout_ms}ms")]
    FallbackTooSlow {
        tag: String,
        delay_ms: u64,
        timeout_ms: u64,
    },

    #[error("dispatch deadline {deadline_ms}ms must exceed the fastest fallback delay {delay_ms}ms")]
    DeadlineTooShort { deadline_ms: u64, delay_ms: u64 },

    #[error("no backends configured")]
    NoBackends,

    #[error("admin routes are enabled without a real api_key")]
    AdminKeyNotSet,
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

fn require_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::Zero(field.to_string()));
    }
}

/// Validate a gateway configuration.
pub fn validate_gateway(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.processors.is_empty() && config.fallbacks.is_empty() {
        errors.push(ValidationError::NoStrategies);
    }

    let mut names = HashSet::new();
    for processor in &config.processors {
        if processor.name.trim().is_empty() {
            errors.push(ValidationError::EmptyProcessorName);
        } else if !names.insert(processor.name.as_str()) {
            errors.push(ValidationError::DuplicateProcessor(processor.name.clone()));
        }
        if !is_http_url(&processor.base_url) {
            errors.push(ValidationError::InvalidUrl {
                owner: format!("processor '{}'", processor.name),
                url: processor.base_url.clone(),
            });
        }
        require_positive(
            &mut errors,
            &format!("processors.{}.call_timeout_ms", processor.name),
            processor.call_timeout_ms,
        );
    }

    if let Some(timeout_ms) = config.processors.iter().map(|p| p.call_timeout_ms).min() {
        for fallback in &config.fallbacks {
            if fallback.delay_ms >= timeout_ms {
                errors.push(ValidationError::FallbackTooSlow {
                    tag: fallback.tag.clone(),
                    delay_ms: fallback.delay_ms,
                    timeout_ms,
                });
            }
        }
    }

    if let Some(delay_ms) = config.fallbacks.iter().map(|f| f.delay_ms).min() {
        if config.dispatch.deadline_ms <= delay_ms {
            errors.push(ValidationError::DeadlineTooShort {
                deadline_ms: config.dispatch.deadline_ms,
                delay_ms,
            });
        }
    }

    require_positive(&mut errors, "dispatch.deadline_ms", config.dispatch.deadline_ms);
    require_positive(
        &mut errors,
        "circuit_breaker.failure_threshold",
        u64::from(config.circuit_breaker.failure_threshold),
    );
    require_positive(&mut errors, "circuit_breaker.cooldown_ms", config.circuit_breaker.cooldown_ms);
    require_positive(&mut errors, "health.window_ms", config.health.window_ms);
    require_positive(&mut errors, "health.probe_timeout_ms", config.health.probe_timeout_ms);
    require_positive(&mut errors, "pool.size", config.pool.size as u64);
    require_positive(&mut errors, "timeouts.request_secs", config.timeouts.request_secs);

    let api_key = config.admin.api_key.trim();
    if config.admin.enabled && (api_key.is_empty() || api_key == PLACEHOLDER_API_KEY) {
        errors.push(ValidationError::AdminKeyNotSet);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a load balancer configuration.
pub fn validate_balancer(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }
    for backend in &config.backends {
        let plain_http = Url::parse(backend).is_ok_and(|u| u.scheme() == "http");
        if !is_http_url(backend) || !plain_http {
            errors.push(ValidationError::InvalidUrl {
                owner: "backend".to_string(),
                url: backend.clone(),
            });
        }
    }
    require_positive(&mut errors, "attempt_timeout_ms", config.attempt_timeout_ms);
    require_positive(&mut errors, "max_body_bytes", config.max_body_bytes as u64);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
