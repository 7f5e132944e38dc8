//! Configuration loading from disk.

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{BalancerConfig, GatewayConfig};
use crate::config::validation::{validate_balancer, validate_gateway, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn load<T, V>(path: &Path, validate: V) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
    V: Fn(&T) -> Result<(), Vec<ValidationError>>,
{
    let content = fs::read_to_string(path)?;
    parse(&content, validate)
}

fn parse<T, V>(content: &str, validate: V) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
    V: Fn(&T) -> Result<(), Vec<ValidationError>>,
{
    let config: T = toml::from_str(content)?;
    validate(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate a gateway configuration from a TOML file.
pub fn load_gateway_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    load(path, validate_gateway)
}

/// Load and validate a load balancer configuration from a TOML file.
pub fn load_balancer_config(path: &Path) -> Result<BalancerConfig, ConfigError> {
    load(path, validate_balancer)
}

/// Parse and validate a gateway configuration held in memory.
pub fn parse_gateway_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    parse(content, validate_gateway)
}
