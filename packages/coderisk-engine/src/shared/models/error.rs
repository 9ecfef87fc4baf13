//! Error types for the engine.
//!
//! Unified error handling across all features:
//! - Categorized error kinds matching the failure taxonomy of the pipeline
//! - Optional operation context
//! - Source error chaining
//!
//! Propagation policy: staging and graph errors are wrapped with the
//! operation name and retried at the batch boundary; beyond the retry
//! budget they bubble up to the command entry point. LLM errors never
//! propagate past the risk engine.

use std::fmt;

/// Error kind categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or ill-formed connection/credential config; fatal at startup.
    ConfigInvalid,
    /// Transient connection/driver failure; retried with bounded backoff.
    StoreUnavailable,
    /// Idempotent MERGE collision or retry; absorbed silently.
    BatchConflict,
    /// A row references data not in staging; the row is skipped.
    DataInconsistent,
    /// LLM endpoint unreachable or misconfigured.
    LlmUnavailable,
    /// LLM refused the call with a rate-limit response.
    LlmRateLimited,
    /// LLM answered outside the constrained schema.
    LlmInvalidResponse,
    /// Context deadline or user interrupt.
    Cancelled,
    /// IO errors (git subprocess, filesystem).
    Io,
    /// Internal errors (bugs).
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigInvalid => "config_invalid",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::BatchConflict => "batch_conflict",
            ErrorKind::DataInconsistent => "data_inconsistent",
            ErrorKind::LlmUnavailable => "llm_unavailable",
            ErrorKind::LlmRateLimited => "llm_rate_limited",
            ErrorKind::LlmInvalidResponse => "llm_invalid_response",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Io => "io",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Unified error type
#[derive(Debug)]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
    /// Operation that failed ("merge_nodes", "fetch_unprocessed_commits", ...).
    pub operation: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            operation: None,
            source: None,
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StoreUnavailable, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BatchConflict, message)
    }

    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DataInconsistent, message)
    }

    pub fn llm_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LlmUnavailable, message)
    }

    pub fn llm_rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LlmRateLimited, message)
    }

    pub fn llm_invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LlmInvalidResponse, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Whether a retry at the batch boundary can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::StoreUnavailable)
    }

    /// Whether this error came from the LLM layer.
    pub fn is_llm(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::LlmUnavailable | ErrorKind::LlmRateLimited | ErrorKind::LlmInvalidResponse
        )
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)?;
        if let Some(ref operation) = self.operation {
            write!(f, " during {}", operation)?;
        }
        Ok(())
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<coderisk_storage::StagingError> for CoreError {
    fn from(err: coderisk_storage::StagingError) -> Self {
        use coderisk_storage::StagingError;
        let kind = match &err {
            StagingError::Config(_) => ErrorKind::ConfigInvalid,
            StagingError::Database(_) => ErrorKind::StoreUnavailable,
            StagingError::Serialization(_)
            | StagingError::NotFound(_)
            | StagingError::InvalidData(_) => ErrorKind::DataInconsistent,
        };
        CoreError::new(kind, err.to_string()).with_source(err)
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::new(ErrorKind::Io, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::inconsistent(format!("JSON error: {}", err)).with_source(err)
    }
}

impl From<tokio::time::error::Elapsed> for CoreError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        CoreError::cancelled("operation deadline exceeded")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_kind_and_operation() {
        let err = CoreError::store("connection refused").with_operation("merge_nodes");

        let msg = format!("{}", err);
        assert!(msg.contains("store_unavailable"));
        assert!(msg.contains("connection refused"));
        assert!(msg.contains("merge_nodes"));
    }

    #[test]
    fn test_only_store_unavailable_is_retryable() {
        assert!(CoreError::store("x").is_retryable());
        assert!(!CoreError::conflict("x").is_retryable());
        assert!(!CoreError::inconsistent("x").is_retryable());
        assert!(!CoreError::llm_rate_limited("x").is_retryable());
    }

    #[test]
    fn test_llm_kinds_are_grouped() {
        assert!(CoreError::llm_unavailable("x").is_llm());
        assert!(CoreError::llm_rate_limited("x").is_llm());
        assert!(CoreError::llm_invalid_response("x").is_llm());
        assert!(!CoreError::cancelled("x").is_llm());
    }
}
