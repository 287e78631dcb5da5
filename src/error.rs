//! Error handling for the proof-of-work miner
//!
//! Error types covering consensus arithmetic, chain records, template
//! construction, block acceptance and worker delegation.

use std::sync::Arc;
use thiserror::Error;

/// Result type alias for miner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the miner
#[derive(Error, Debug)]
pub enum Error {
    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (bad interval, malformed options)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Target encoding or validation errors
    #[error("Invalid target: {message}")]
    InvalidTarget { message: String },

    /// Malformed serialized records
    #[error("Encoding error: {message}")]
    Encoding { message: String },

    /// Block template could not be built
    #[error("Template error: {message}")]
    Template { message: String },

    /// Block rejected by the chain
    #[error("Verification failed: {reason}")]
    Verification { reason: String },

    /// Illegal state transition (double start, double commit, double destroy)
    #[error("Invalid state: {message}")]
    State { message: String },

    /// Worker errors
    #[error("Worker error: {worker_type}: {message}")]
    Worker { worker_type: String, message: String },

    /// External process errors
    #[error("External process error: {message}")]
    ExternalProcess { message: String },

    /// Timeout errors
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// Fatal mining loop error, as shared on the event stream
    #[error("{0}")]
    Engine(Arc<Error>),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a target error
    pub fn invalid_target(message: impl Into<String>) -> Self {
        Self::InvalidTarget {
            message: message.into(),
        }
    }

    /// Create an encoding error
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create a verification error
    pub fn verification(reason: impl Into<String>) -> Self {
        Self::Verification {
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a worker error
    pub fn worker(worker_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Worker {
            worker_type: worker_type.into(),
            message: message.into(),
        }
    }

    /// Create an external process error
    pub fn external_process(message: impl Into<String>) -> Self {
        Self::ExternalProcess {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Whether the mining loop may keep going after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Engine(inner) => inner.is_recoverable(),
            other => matches!(other, Error::Verification { .. }),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Io(_) => "io",
            Error::Config { .. } => "config",
            Error::InvalidTarget { .. } => "target",
            Error::Encoding { .. } => "encoding",
            Error::Template { .. } => "template",
            Error::Verification { .. } => "verification",
            Error::State { .. } => "state",
            Error::Worker { .. } => "worker",
            Error::ExternalProcess { .. } => "external_process",
            Error::Timeout { .. } => "timeout",
            Error::Engine(inner) => inner.category(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_constructors() {
        assert_matches!(Error::config("x"), Error::Config { message } if message == "x");
        assert_matches!(
            Error::worker("local", "boom"),
            Error::Worker { worker_type, .. } if worker_type == "local"
        );
        assert_eq!(
            Error::verification("high-hash").to_string(),
            "Verification failed: high-hash"
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::verification("bad-txnmrklroot").is_recoverable());
        assert!(!Error::template("no tip").is_recoverable());
        assert!(!Error::state("already running").is_recoverable());
    }

    #[test]
    fn test_category() {
        assert_eq!(Error::timeout("search").category(), "timeout");
        assert_eq!(Error::encoding("short").category(), "encoding");
        let io = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "x"));
        assert_eq!(io.category(), "io");
    }

    #[test]
    fn test_engine_error_keeps_inner_kind() {
        let err = Error::Engine(Arc::new(Error::worker("cpu", "pool gone")));
        assert_eq!(err.category(), "worker");
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "Worker error: cpu: pool gone");
        assert!(Error::Engine(Arc::new(Error::verification("high-hash"))).is_recoverable());
    }
}
