//! Error types for TribeFlow.
//!
//! Training is an all-or-nothing batch computation, so errors carry enough
//! structure to say *where* a run died, not how to resume it:
//! - Stable error codes for machine parsing
//! - Category classification matching the failure taxonomy
//!   (configuration, data consistency, worker-internal, merge protocol)
//!
//! Errors serialize to structured JSON via [`Error::to_report`]:
//! ```json
//! {
//!   "code": 31,
//!   "category": "worker",
//!   "message": "worker 2 produced a degenerate topic distribution for event 17"
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for TribeFlow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid hyperparameters or configuration files.
    Config,
    /// Trace contents or count tables that are internally inconsistent.
    Data,
    /// Failures raised inside a worker thread.
    Worker,
    /// Violations of the pairing/merge contract between workers.
    Protocol,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Data => write!(f, "data"),
            ErrorCategory::Worker => write!(f, "worker"),
            ErrorCategory::Protocol => write!(f, "protocol"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for TribeFlow.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid value for {field}: {message}")]
    InvalidHyperParams { field: String, message: String },

    // Data-consistency errors (20-29)
    #[error("data error: {0}")]
    Data(String),

    #[error("invalid trace at line {line}: {message}")]
    InvalidTrace { line: usize, message: String },

    #[error("inconsistent counts: {0}")]
    InconsistentCounts(String),

    // Worker-internal errors (30-39)
    #[error("worker {worker} failed: {message}")]
    Worker { worker: usize, message: String },

    #[error("worker {worker} produced a degenerate topic distribution for event {event}")]
    DegenerateDistribution { worker: usize, event: usize },

    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    #[error("channel closed: {0}")]
    ChannelClosed(String),

    // Merge-protocol errors (40-49)
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Data-consistency errors
    /// - 30-39: Worker errors
    /// - 40-49: Merge-protocol errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidHyperParams { .. } => 11,
            Error::Data(_) => 20,
            Error::InvalidTrace { .. } => 21,
            Error::InconsistentCounts(_) => 22,
            Error::Worker { .. } => 30,
            Error::DegenerateDistribution { .. } => 31,
            Error::WorkerPanicked { .. } => 32,
            Error::ChannelClosed(_) => 33,
            Error::Protocol(_) => 40,
            Error::ShapeMismatch { .. } => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidHyperParams { .. } => ErrorCategory::Config,

            Error::Data(_) | Error::InvalidTrace { .. } | Error::InconsistentCounts(_) => {
                ErrorCategory::Data
            }

            Error::Worker { .. }
            | Error::DegenerateDistribution { .. }
            | Error::WorkerPanicked { .. }
            | Error::ChannelClosed(_) => ErrorCategory::Worker,

            Error::Protocol(_) | Error::ShapeMismatch { .. } => ErrorCategory::Protocol,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Whether the failure is caused by the caller's input rather than by the
    /// training run itself.
    ///
    /// Input errors are raised before any worker thread starts.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Config | ErrorCategory::Data | ErrorCategory::Io
        )
    }

    /// Convenience constructor for worker failures.
    pub fn worker(worker: usize, message: impl Into<String>) -> Self {
        Error::Worker {
            worker,
            message: message.into(),
        }
    }

    /// Structured form for machine consumers.
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            category: self.category(),
            message: self.to_string(),
        }
    }
}

/// Serializable error summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: u32,
    pub category: ErrorCategory,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_category_ranges() {
        let cases: Vec<(Error, ErrorCategory, u32)> = vec![
            (Error::Config("x".into()), ErrorCategory::Config, 10),
            (
                Error::InvalidTrace {
                    line: 3,
                    message: "bad".into(),
                },
                ErrorCategory::Data,
                21,
            ),
            (
                Error::DegenerateDistribution { worker: 1, event: 9 },
                ErrorCategory::Worker,
                31,
            ),
            (
                Error::ShapeMismatch {
                    what: "Count_sz".into(),
                    expected: (3, 2),
                    actual: (2, 2),
                },
                ErrorCategory::Protocol,
                41,
            ),
        ];
        for (err, category, code) in cases {
            assert_eq!(err.category(), category, "{err}");
            assert_eq!(err.code(), code, "{err}");
        }
    }

    #[test]
    fn input_errors_are_config_data_or_io() {
        assert!(Error::Config("bad".into()).is_input_error());
        assert!(Error::InconsistentCounts("sum".into()).is_input_error());
        assert!(!Error::WorkerPanicked { worker: 0 }.is_input_error());
        assert!(!Error::Protocol("late".into()).is_input_error());
    }

    #[test]
    fn report_serializes_category_snake_case() {
        let report = Error::worker(2, "boom").to_report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["code"], 30);
        assert_eq!(json["category"], "worker");
        assert_eq!(json["message"], "worker 2 failed: boom");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert_eq!(err.category(), ErrorCategory::Io);
        assert_eq!(err.code(), 60);
    }
}
