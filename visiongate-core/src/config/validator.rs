//! Configuration validation utilities

use super::error::{ValidationError, ValidationErrorKind};
use super::schema::GatewayConfig;
use crate::providers::adapter::ProviderKind;
use tracing::warn;

/// Configuration validator with rules that span fields
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &GatewayConfig) -> Result<(), ValidationError> {
        // First run the built-in validation
        config.validate()?;

        self.validate_credentials(config);
        self.validate_image_limits(config)?;

        Ok(())
    }

    /// Missing credentials surface as `Unauthorized` at call time; warn early
    fn validate_credentials(&self, config: &GatewayConfig) {
        for provider in &config.providers {
            if provider.provider.requires_api_key() && provider.api_key().is_none() {
                warn!(
                    "Provider '{}' has no API key; calls will fail as unauthorized",
                    provider.provider.as_str()
                );
            }
        }
    }

    /// A configured limit may tighten, never loosen, a backend's hard limit
    fn validate_image_limits(&self, config: &GatewayConfig) -> Result<(), ValidationError> {
        for (i, provider) in config.providers.iter().enumerate() {
            let (Some(configured), Some(hard_limit)) = (
                provider.max_image_bytes,
                provider.provider.default_max_image_bytes(),
            ) else {
                continue;
            };

            if configured > hard_limit {
                return Err(ValidationError::new(
                    format!("providers[{}].max_image_bytes", i),
                    ValidationErrorKind::ImageLimitAboveBackend {
                        configured,
                        backend: provider.provider.as_str().to_string(),
                        hard_limit,
                    },
                ));
            }
        }

        Ok(())
    }
}
