use thiserror::Error;

use crate::llm::LlmError;

/// Errors from session storage backends.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid session id: '{0}'")]
    InvalidId(String),
}

impl From<std::io::Error> for RepositoryError {
    fn from(e: std::io::Error) -> Self {
        RepositoryError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        RepositoryError::Serialization(e.to_string())
    }
}

/// Errors that fail a chat turn.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("no model available for provider '{provider}' and model '{model}'")]
    ModelUnavailable { provider: String, model: String },

    #[error("question is empty")]
    EmptyQuestion,

    #[error("session '{0}' disappeared during the turn")]
    SessionVanished(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::InvalidId("../etc".to_string());
        assert_eq!(err.to_string(), "invalid session id: '../etc'");
    }

    #[test]
    fn test_repository_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: RepositoryError = io.into();
        assert!(matches!(err, RepositoryError::Io(_)));
    }

    #[test]
    fn test_chat_error_wraps_sources() {
        let err: ChatError = RepositoryError::Query("locked".to_string()).into();
        assert_eq!(err.to_string(), "query error: locked");

        let err: ChatError = LlmError::AuthenticationFailed.into();
        assert!(matches!(err, ChatError::Llm(_)));
    }

    #[test]
    fn test_model_unavailable_display() {
        let err = ChatError::ModelUnavailable {
            provider: "acme".to_string(),
            model: "m1".to_string(),
        };
        assert!(err.to_string().contains("'acme'"));
        assert!(err.to_string().contains("'m1'"));
    }
}
