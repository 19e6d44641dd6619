//! Configuration module for the gateway
//!
//! This module provides the provider settings schema plus YAML/JSON loading
//! with `${ENV_VAR}` interpolation and validation. The surrounding application
//! owns where settings live; the gateway only reads a snapshot per call.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{GatewayConfig, ProviderConfig};
pub use secrets::SecretString;
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<GatewayConfig> {
    let path = path.as_ref();
    let content = read_config(path)?;

    let mut config: GatewayConfig =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Syntax {
            path: path.to_string_lossy().to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    finish(&mut config)?;
    Ok(config)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<GatewayConfig> {
    let path = path.as_ref();
    let content = read_config(path)?;

    let mut config: GatewayConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::Syntax {
            path: path.to_string_lossy().to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    finish(&mut config)?;
    Ok(config)
}

/// Read a config file and interpolate environment variables before parsing
fn read_config(path: &Path) -> ConfigResult<String> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;

    env::interpolate_env_vars(&content)
}

fn finish(config: &mut GatewayConfig) -> ConfigResult<()> {
    env::interpolate_config_env_vars(config)?;
    ConfigValidator::new().validate(config)?;
    Ok(())
}
