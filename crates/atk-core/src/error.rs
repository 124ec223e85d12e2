// ATK Core - Error types
//
// Operation failures are values (see `envelope`), so `AtkError` only covers
// misuse of the tool surface itself: bad arguments, unknown tools, broken
// configuration.

use thiserror::Error;

pub type AtkResult<T> = Result<T, AtkError>;

#[derive(Debug, Error)]
pub enum AtkError {
    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AtkError {
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AtkError::tool("boom").to_string(), "Tool error: boom");
        assert_eq!(
            AtkError::invalid_argument("missing 'index'").to_string(),
            "Invalid argument: missing 'index'"
        );
        assert_eq!(
            AtkError::config("no spec").to_string(),
            "Configuration error: no spec"
        );
    }

    #[test]
    fn test_transport_error_conversion() {
        let err: AtkError = crate::transport::TransportError::Timeout("30s".into()).into();
        assert!(matches!(err, AtkError::Transport(_)));
        assert!(err.to_string().contains("timed out"));
    }
}
