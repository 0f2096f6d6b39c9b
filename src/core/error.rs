use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Resource has neither service.name nor service.instance.id")]
    MissingIdentity,

    #[error("Invalid span data: {0}")]
    InvalidSpan(String),

    #[error("Invalid log record: {0}")]
    InvalidLog(String),

    #[error("Invalid metric: {0}")]
    InvalidMetric(String),

    #[error("Invalid {kind}: {reason}")]
    InvalidId { kind: &'static str, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Query cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// Result type alias for repository operations
pub type Result<T> = std::result::Result<T, RepositoryError>;

impl RepositoryError {
    /// Creates a new span validation error
    pub fn invalid_span<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSpan(msg.into())
    }

    /// Creates a new log validation error
    pub fn invalid_log<S: Into<String>>(msg: S) -> Self {
        Self::InvalidLog(msg.into())
    }

    /// Creates a new metric validation error
    pub fn invalid_metric<S: Into<String>>(msg: S) -> Self {
        Self::InvalidMetric(msg.into())
    }

    /// Creates a new identifier error
    pub fn invalid_id<S: Into<String>>(kind: &'static str, reason: S) -> Self {
        Self::InvalidId {
            kind,
            reason: reason.into(),
        }
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new query precondition error
    pub fn invalid_query<S: Into<String>>(msg: S) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// Returns true if the error came from malformed external data.
    ///
    /// Ingestion and import count these and keep going; everything else is a
    /// caller or environment problem.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::MissingIdentity
                | Self::InvalidSpan(_)
                | Self::InvalidLog(_)
                | Self::InvalidMetric(_)
                | Self::InvalidId { .. }
                | Self::Serialization(_)
                | Self::Archive(_)
        )
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingIdentity | Self::InvalidId { .. } => "identity",
            Self::InvalidSpan(_) | Self::InvalidLog(_) | Self::InvalidMetric(_) => "validation",
            Self::Config(_) => "config",
            Self::InvalidQuery(_) => "query",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
            Self::Serialization(_) | Self::Archive(_) => "serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RepositoryError::invalid_span("span id is empty");
        assert_eq!(err.to_string(), "Invalid span data: span id is empty");
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_malformed_input_classification() {
        assert!(RepositoryError::MissingIdentity.is_malformed_input());
        assert!(RepositoryError::invalid_id("trace id", "expected 16 bytes").is_malformed_input());
        assert!(!RepositoryError::invalid_query("start after end").is_malformed_input());
        assert!(!RepositoryError::Cancelled.is_malformed_input());
    }

    #[test]
    fn test_invalid_id_message() {
        let err = RepositoryError::invalid_id("span id", "expected 8 bytes, got 3");
        assert_eq!(err.to_string(), "Invalid span id: expected 8 bytes, got 3");
        assert_eq!(err.category(), "identity");
    }
}
