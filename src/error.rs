//! Error types for the command resolver.

use thiserror::Error;

/// Main error type for resolver operations.
#[derive(Error, Debug)]
pub enum AssistError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Errors raised while turning raw input into an intent or a filter.
///
/// All of these are reported to the user; none of them is fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Malformed command '{command}': {reason}")]
    MalformedCommand { command: String, reason: String },

    #[error("Unparsable id '{0}': out of range for a 64-bit integer")]
    UnparsableId(String),

    #[error("Invalid date expression '{expression}': {reason}")]
    DateParse { expression: String, reason: String },
}

impl ResolveError {
    pub(crate) fn malformed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedCommand {
            command: command.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn date(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DateParse {
            expression: expression.into(),
            reason: reason.into(),
        }
    }
}

/// Failures surfaced by a backend collaborator.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),
}

/// Result type alias for resolver operations.
pub type Result<T> = std::result::Result<T, AssistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AssistError::Config(ConfigError::MissingField("backend.organization".to_string()));
        assert!(err.to_string().contains("backend.organization"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AssistError = io_err.into();
        assert!(matches!(err, AssistError::Io(_)));

        let err: AssistError = ResolveError::UnparsableId("99999999999999999999".into()).into();
        assert!(matches!(err, AssistError::Resolve(ResolveError::UnparsableId(_))));
    }

    #[test]
    fn test_malformed_message_names_command() {
        let err = ResolveError::malformed("create_item", "expected 2 arguments, got 1");
        assert_eq!(
            err.to_string(),
            "Malformed command 'create_item': expected 2 arguments, got 1"
        );
    }
}
