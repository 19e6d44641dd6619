//! Errors raised while loading a gateway config file

use std::fmt;
use thiserror::Error;

/// Why a gateway config could not be loaded
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read gateway config '{path}': {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a valid gateway config{}: {message}", location(.line, .column))]
    Syntax {
        path: String,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    #[error("invalid gateway config: {0}")]
    Invalid(#[from] ValidationError),

    #[error("config references ${{{var}}} but the variable is not set")]
    MissingEnvVar { var: String },
}

fn location(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(" (line {}, column {})", line, column),
        (Some(line), None) => format!(" (line {})", line),
        _ => String::new(),
    }
}

/// A rejected setting, addressed by its path in the document
#[derive(Debug, Error)]
pub struct ValidationError {
    /// Where the setting lives, e.g. `providers[1].base_url`
    pub field_path: String,
    pub kind: ValidationErrorKind,
    /// Extra guidance for the operator
    pub hint: Option<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field_path, self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, "; {}", hint)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ValidationErrorKind {
    #[error("must be set")]
    Missing,

    #[error("unsupported config version {found} (this build reads {supported})")]
    UnsupportedVersion { supported: String, found: String },

    #[error("backend '{backend}' is configured more than once")]
    DuplicateBackend { backend: String },

    #[error("backend '{backend}' is not listed under providers")]
    BackendNotConfigured { backend: String },

    #[error("base URL rejected: {message}")]
    InvalidUrl { message: String },

    #[error("{message}")]
    OutOfRange { message: String },

    #[error("only applies to the {applies_to} backend")]
    WrongBackend { applies_to: String },

    #[error("{configured} bytes is above the {backend} limit of {hard_limit} bytes")]
    ImageLimitAboveBackend {
        configured: usize,
        backend: String,
        hard_limit: usize,
    },
}

impl ValidationError {
    pub fn new(field_path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            field_path: field_path.into(),
            kind,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn missing(field_path: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::Missing)
    }

    pub fn out_of_range(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            field_path,
            ValidationErrorKind::OutOfRange {
                message: message.into(),
            },
        )
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_names_the_location() {
        let err = ConfigError::Syntax {
            path: "gateway.yaml".into(),
            line: Some(4),
            column: Some(7),
            message: "unknown variant `openai`".into(),
        };
        assert_eq!(
            err.to_string(),
            "'gateway.yaml' is not a valid gateway config (line 4, column 7): unknown variant `openai`"
        );
    }

    #[test]
    fn test_validation_error_renders_path_and_hint() {
        let err = ValidationError::missing("providers").with_hint("add at least one backend");
        assert_eq!(err.to_string(), "providers: must be set; add at least one backend");

        let err = ConfigError::from(ValidationError::new(
            "providers[0].max_image_bytes",
            ValidationErrorKind::ImageLimitAboveBackend {
                configured: 6_000_000,
                backend: "messages_api".into(),
                hard_limit: 5_242_880,
            },
        ));
        assert_eq!(
            err.to_string(),
            "invalid gateway config: providers[0].max_image_bytes: 6000000 bytes is above \
             the messages_api limit of 5242880 bytes"
        );
    }

    #[test]
    fn test_missing_env_var_message() {
        let err = ConfigError::MissingEnvVar {
            var: "VG_KEY".into(),
        };
        assert_eq!(err.to_string(), "config references ${VG_KEY} but the variable is not set");
    }
}
