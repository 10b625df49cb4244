//! # Error Types
//!
//! Error types for secretlink using `thiserror`.

use std::fmt;

use super::tls::TlsError;

/// Custom result type for secretlink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for secretlink
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Referenced configuration or resource is absent
    #[error("{resource_type} {id:?} not found")]
    NotFound { resource_type: String, id: String },

    /// Namespace condition mismatch or configuration not owned by this controller
    #[error("access denied: {message}")]
    AccessDenied { message: String },

    /// Readiness gate failed
    #[error("{kind} {name:?} is not ready")]
    NotReady { kind: String, name: String },

    /// Missing or invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transport bootstrap or dial failure
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The wrapped or remote backend call failed
    #[error("upstream error ({code}): {message}")]
    Upstream { code: tonic::Code, message: String },

    /// Unexpected local failure
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Aggregated failures of a shutdown sweep
    #[error("errors while closing clients: {}", join_failures(.failures))]
    Shutdown { failures: Vec<CloseFailure> },

    /// Operation exceeded its deadline
    #[error("Operation timed out: {operation} after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// TLS material errors
    #[error(transparent)]
    Tls(#[from] TlsError),

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        context: String,
    },
}

/// One failed close during a shutdown sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFailure {
    /// Cache key of the client that failed to close
    pub key: String,
    /// Rendered close error
    pub error: String,
}

impl fmt::Display for CloseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.error)
    }
}

fn join_failures(failures: &[CloseFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl Error {
    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create an access denied error
    pub fn access_denied<S: Into<String>>(message: S) -> Self {
        Self::AccessDenied { message: message.into() }
    }

    /// Create a not ready error
    pub fn not_ready<K: Into<String>, N: Into<String>>(kind: K, name: N) -> Self {
        Self::NotReady { kind: kind.into(), name: name.into() }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Create a connection error with source
    pub fn connection_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(source) }
    }

    /// Create an upstream error with an explicit status code
    pub fn upstream<S: Into<String>>(code: tonic::Code, message: S) -> Self {
        Self::Upstream { code, message: message.into() }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Create an internal error with source
    pub fn internal_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(source) }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration_ms: u64) -> Self {
        Self::Timeout { operation: operation.into(), duration_ms }
    }

    /// Wrap a status returned by a remote backend. The code and message are
    /// kept verbatim.
    pub fn from_status(status: tonic::Status) -> Self {
        Self::Upstream { code: status.code(), message: status.message().to_string() }
    }

    /// Whether a caller may reasonably retry. Nothing in this crate retries on
    /// its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Connection { .. } | Error::Timeout { .. } | Error::NotReady { .. } => true,
            Error::Upstream { code, .. } => {
                matches!(code, tonic::Code::Unavailable | tonic::Code::DeadlineExceeded)
            }
            _ => false,
        }
    }
}

impl From<Error> for tonic::Status {
    fn from(error: Error) -> Self {
        let message = error.to_string();
        match error {
            Error::NotFound { .. } => tonic::Status::not_found(message),
            Error::AccessDenied { .. } => tonic::Status::permission_denied(message),
            Error::NotReady { .. } => tonic::Status::failed_precondition(message),
            Error::Config { .. } => tonic::Status::invalid_argument(message),
            Error::Connection { .. } => tonic::Status::unavailable(message),
            Error::Upstream { code, message } => tonic::Status::new(code, message),
            Error::Timeout { .. } => tonic::Status::deadline_exceeded(message),
            Error::Tls(_) => tonic::Status::unavailable(message),
            Error::Serialization { .. } => tonic::Status::invalid_argument(message),
            Error::Internal { .. } | Error::Shutdown { .. } | Error::Io { .. } => {
                tonic::Status::internal(message)
            }
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            source: Box::new(error),
            context: "JSON serialization failed".to_string(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Self::Serialization {
            source: Box::new(error),
            context: "YAML deserialization failed".to_string(),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::config(format!("Validation failed: {}", message))
    }
}
