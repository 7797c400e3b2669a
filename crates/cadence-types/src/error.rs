use thiserror::Error;

/// Errors from repository and index operations (used by trait definitions in cadence-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("embedding error: {0}")]
    Embedding(String),
}

/// Errors raised while assembling runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A credential the service cannot start without is absent.
    #[error("missing credential: {0} must be set")]
    MissingCredential(&'static str),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_missing_credential_names_variable() {
        let err = ConfigError::MissingCredential("GOOGLE_API_KEY");
        assert_eq!(err.to_string(), "missing credential: GOOGLE_API_KEY must be set");
    }

    #[test]
    fn test_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            key: "GEMINI_TEMPERATURE",
            message: "not a number".to_string(),
        };
        assert!(err.to_string().contains("GEMINI_TEMPERATURE"));
        assert!(err.to_string().contains("not a number"));
    }
}
