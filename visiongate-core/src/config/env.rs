//! Environment variable interpolation for configuration

use super::error::ConfigError;
use super::schema::GatewayConfig;
use super::secrets::SecretString;
use regex::Regex;
use std::env;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env var pattern is valid")
});

/// Interpolate environment variables in a configuration string
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut result = content.to_string();
    let mut missing_vars = Vec::new();

    for cap in ENV_VAR_PATTERN.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];

        match env::var(var_name) {
            Ok(value) => {
                result = result.replace(full_match, &value);
            }
            Err(_) => {
                missing_vars.push(var_name.to_string());
            }
        }
    }

    // Report the first missing variable
    if let Some(var) = missing_vars.into_iter().next() {
        return Err(ConfigError::MissingEnvVar { var });
    }

    Ok(result)
}

/// Interpolate credential and base URL fields after loading
///
/// Values injected through serde defaults or programmatic construction can
/// still carry placeholders; only these two fields are expanded.
pub fn interpolate_config_env_vars(config: &mut GatewayConfig) -> Result<(), ConfigError> {
    for provider in &mut config.providers {
        if let Some(api_key) = &provider.api_key {
            if ENV_VAR_PATTERN.is_match(api_key.expose_secret()) {
                let interpolated = interpolate_single_value(api_key.expose_secret())?;
                provider.api_key = Some(SecretString::new(interpolated));
            }
        }

        if let Some(base_url) = &provider.base_url {
            if ENV_VAR_PATTERN.is_match(base_url) {
                provider.base_url = Some(interpolate_single_value(base_url)?);
            }
        }
    }

    Ok(())
}

/// Interpolate a single value that may contain environment variables
fn interpolate_single_value(value: &str) -> Result<String, ConfigError> {
    let mut result = value.to_string();
    for cap in ENV_VAR_PATTERN.captures_iter(value) {
        let var_name = &cap[1];
        let env_value = env::var(var_name).map_err(|_| ConfigError::MissingEnvVar {
            var: var_name.to_string(),
        })?;
        result = result.replace(&cap[0], &env_value);
    }
    Ok(result)
}
