//! Error types for the execution crate.
//!
//! - `TransportError`: Telemetry socket failures
//! - `RunError`: Failures starting a workflow run

use std::fmt;

/// Errors from the telemetry transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The telemetry URL could not be turned into a request.
    InvalidUrl { url: String, details: String },
    /// Opening the socket failed.
    ConnectFailed { url: String, details: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { url, details } => write!(f, "invalid telemetry URL {url}: {details}"),
            Self::ConnectFailed { url, details } => {
                write!(f, "failed to connect to {url}: {details}")
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors from the run command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// The request could not be sent.
    RequestFailed { details: String },
    /// The service answered with a non-success status.
    Rejected { status: u16, body: String },
    /// The response body did not carry an execution ID.
    InvalidResponse { details: String },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { details } => write!(f, "run request failed: {details}"),
            Self::Rejected { status, body } => write!(f, "run rejected with status {status}: {body}"),
            Self::InvalidResponse { details } => write!(f, "invalid run response: {details}"),
        }
    }
}

impl std::error::Error for RunError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_display_includes_status() {
        let err = RunError::Rejected {
            status: 409,
            body: "already running".to_string(),
        };
        assert_eq!(err.to_string(), "run rejected with status 409: already running");
    }
}
