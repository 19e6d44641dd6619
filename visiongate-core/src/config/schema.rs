//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use crate::providers::adapter::ProviderKind;
use crate::providers::error::{AdapterError, AdapterResult};
use crate::providers::local::LocalProtocol;
use serde::{Deserialize, Serialize};

/// Root configuration structure for the gateway
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// Provider used when the caller does not pick one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<ProviderKind>,

    /// Configured backends, at most one per kind
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// Read-only settings snapshot for one backend
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Which backend this config targets
    pub provider: ProviderKind,

    /// Model identifier
    pub model: String,

    /// Base URL override (required in practice only for the local backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Opaque credential; absent for the local backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<SecretString>,

    /// Per-image byte limit enforced by the gateway before translation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_image_bytes: Option<usize>,

    /// Whether the backend should be asked to stream
    #[serde(default = "default_true")]
    pub supports_streaming: bool,

    /// Maximum output tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Forces the local backend's sub-protocol instead of the model-name heuristic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_protocol: Option<LocalProtocol>,
}

fn default_true() -> bool {
    true
}

impl ProviderConfig {
    /// Create a config for a backend and model with defaults everywhere else
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
            api_key: None,
            max_image_bytes: provider.default_max_image_bytes(),
            supports_streaming: true,
            max_tokens: None,
            temperature: None,
            local_protocol: None,
        }
    }

    /// Set the credential
    pub fn with_api_key(mut self, api_key: impl Into<SecretString>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set or clear the per-image byte limit
    pub fn with_max_image_bytes(mut self, max_image_bytes: Option<usize>) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    /// Set whether the backend should stream
    pub fn with_streaming(mut self, supports_streaming: bool) -> Self {
        self.supports_streaming = supports_streaming;
        self
    }

    /// Set max output tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Force the local backend's sub-protocol
    pub fn with_local_protocol(mut self, protocol: LocalProtocol) -> Self {
        self.local_protocol = Some(protocol);
        self
    }

    /// Base URL with the backend default applied and trailing slashes removed
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    /// Credential, if one is configured and non-blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret().trim())
            .filter(|key| !key.is_empty())
    }

    /// Credential or an `Unauthorized` error naming the backend
    pub fn require_api_key(&self) -> AdapterResult<&str> {
        self.api_key().ok_or_else(|| {
            AdapterError::unauthorized("no API key configured")
                .with_context(self.provider.as_str(), &self.model)
        })
    }

    /// Validate provider configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.model.trim().is_empty() {
            return Err(ValidationError::missing(format!("{}.model", path)));
        }

        if let Some(base_url) = &self.base_url {
            // Proper URL validation using url crate
            match url::Url::parse(base_url) {
                Ok(url) => {
                    if url.scheme() != "http" && url.scheme() != "https" {
                        return Err(ValidationError::new(
                            format!("{}.base_url", path),
                            ValidationErrorKind::InvalidUrl {
                                message: format!("scheme must be http or https, not {}", url.scheme()),
                            },
                        ));
                    }
                }
                Err(e) => {
                    return Err(ValidationError::new(
                        format!("{}.base_url", path),
                        ValidationErrorKind::InvalidUrl {
                            message: e.to_string(),
                        },
                    ));
                }
            }
        }

        if self.max_image_bytes == Some(0) {
            return Err(ValidationError::out_of_range(
                format!("{}.max_image_bytes", path),
                "must be greater than zero",
            ));
        }

        if self.max_tokens == Some(0) {
            return Err(ValidationError::out_of_range(
                format!("{}.max_tokens", path),
                "must be greater than zero",
            ));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ValidationError::out_of_range(
                    format!("{}.temperature", path),
                    "must be between 0.0 and 2.0",
                ));
            }
        }

        if self.local_protocol.is_some() && self.provider != ProviderKind::LocalModel {
            return Err(ValidationError::new(
                format!("{}.local_protocol", path),
                ValidationErrorKind::WrongBackend {
                    applies_to: ProviderKind::LocalModel.as_str().to_string(),
                },
            ));
        }

        Ok(())
    }
}

impl GatewayConfig {
    /// Config for the given backend, if present
    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.provider == kind)
    }

    /// Config for the default backend, falling back to the first one listed
    pub fn default_provider(&self) -> Option<&ProviderConfig> {
        match self.default_provider {
            Some(kind) => self.provider(kind),
            None => self.providers.first(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::missing("version"));
        }

        // Currently support only version 0.1
        if self.version != "0.1" {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::UnsupportedVersion {
                    supported: "0.1".to_string(),
                    found: self.version.clone(),
                },
            ));
        }

        if self.providers.is_empty() {
            return Err(ValidationError::missing("providers")
                .with_hint("configure at least one backend"));
        }

        let mut seen = std::collections::HashSet::new();
        for (i, provider) in self.providers.iter().enumerate() {
            if !seen.insert(provider.provider) {
                return Err(ValidationError::new(
                    format!("providers[{}].provider", i),
                    ValidationErrorKind::DuplicateBackend {
                        backend: provider.provider.as_str().to_string(),
                    },
                ));
            }

            provider.validate(&format!("providers[{}]", i))?;
        }

        if let Some(kind) = self.default_provider {
            if self.provider(kind).is_none() {
                return Err(ValidationError::new(
                    "default_provider",
                    ValidationErrorKind::BackendNotConfigured {
                        backend: kind.as_str().to_string(),
                    },
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_applies_backend_image_limit() {
        let config = ProviderConfig::new(ProviderKind::MessagesApi, "claude-sonnet-4");
        assert_eq!(config.max_image_bytes, Some(5 * 1024 * 1024));

        let config = ProviderConfig::new(ProviderKind::LocalModel, "llava");
        assert_eq!(config.max_image_bytes, None);
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let config = ProviderConfig::new(ProviderKind::Completions, "gpt-4o").with_api_key("  ");
        assert!(config.api_key().is_none());

        let err = config.require_api_key().unwrap_err();
        assert_eq!(err.kind, crate::providers::error::ErrorKind::Unauthorized);
        assert_eq!(err.provider, "completions");
        assert_eq!(err.model, "gpt-4o");
    }

    #[test]
    fn test_resolved_base_url_trims_slash() {
        let config = ProviderConfig::new(ProviderKind::LocalModel, "llava")
            .with_base_url("http://localhost:11434/");
        assert_eq!(config.resolved_base_url(), "http://localhost:11434");

        let config = ProviderConfig::new(ProviderKind::Completions, "gpt-4o");
        assert_eq!(config.resolved_base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn test_local_protocol_rejected_for_hosted_backend() {
        let config = ProviderConfig::new(ProviderKind::Generative, "gemini-2.0-flash")
            .with_local_protocol(LocalProtocol::Generate);
        let err = config.validate("providers[0]").unwrap_err();
        assert_eq!(err.field_path, "providers[0].local_protocol");
        assert_eq!(
            err.to_string(),
            "providers[0].local_protocol: only applies to the local_model backend"
        );
    }
}
