//! Error types for request execution.
//!
//! # Design
//! Every failure mode stays distinguishable here even though the boolean
//! `execute` contract collapses them all to `false`. Non-2xx responses keep
//! their raw status and body, plus an optional `Diagnostic` recognised from
//! the gateway's error text. The diagnostic is for operators reading logs;
//! it never changes control flow.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Errors produced while building, dispatching or classifying a request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The caller's ceiling elapsed before the worker produced a result.
    #[error("no response within {after:?}")]
    Timeout { after: Duration },

    /// Connection refused or reset, DNS failure, I/O error, or a transport-level timeout.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered with a status outside `[200, 300)`.
    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
        diagnostic: Option<Diagnostic>,
    },

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported HTTP method: {0:?}")]
    UnsupportedMethod(String),

    /// The execution context was shut down before the request was scheduled.
    #[error("execution context has been shut down")]
    Shutdown,

    /// The worker went away without reporting (it panicked, or the pool was torn down under it).
    #[error("worker exited before producing a result")]
    WorkerLost,
}

impl RequestError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RequestError::Timeout { .. } => FailureKind::Timeout,
            RequestError::Transport(_) | RequestError::WorkerLost => FailureKind::Transport,
            RequestError::Status { status, .. } if (400..500).contains(status) => {
                FailureKind::ClientStatus
            }
            RequestError::Status { .. } => FailureKind::ServerStatus,
            RequestError::InvalidUrl { .. } | RequestError::UnsupportedMethod(_) => {
                FailureKind::InvalidInput
            }
            RequestError::Shutdown => FailureKind::Shutdown,
        }
    }

    /// HTTP status when the failure is a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn diagnostic(&self) -> Option<Diagnostic> {
        match self {
            RequestError::Status { diagnostic, .. } => *diagnostic,
            _ => None,
        }
    }
}

/// Coarse failure category, stable enough to map across the FFI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Transport,
    /// 4xx response.
    ClientStatus,
    /// 5xx, or any other status outside the success range.
    ServerStatus,
    InvalidInput,
    Shutdown,
}

/// Known gateway failure causes, recognised from status code and body text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// 401 and the gateway saw no `apikey` header at all.
    MissingApiKey,
    /// 401 and the key was present but rejected.
    InvalidApiKey,
    /// 401 for any other reason.
    Unauthorized,
    /// 400; usually the JSON payload does not match the table.
    MalformedBody,
    /// 404; the table or endpoint does not exist.
    NotFound,
}

impl Diagnostic {
    pub fn describe(&self) -> &'static str {
        match self {
            Diagnostic::MissingApiKey => "API key not found in request headers",
            Diagnostic::InvalidApiKey => "API key is invalid",
            Diagnostic::Unauthorized => "request was not authorized",
            Diagnostic::MalformedBody => "bad request, check the JSON format",
            Diagnostic::NotFound => "table or endpoint not found",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Failure to bring up the worker pool.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to start worker pool: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker pool needs at least one worker")]
    NoWorkers,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> RequestError {
        RequestError::Status {
            status,
            body: String::new(),
            diagnostic: None,
        }
    }

    #[test]
    fn statuses_split_into_client_and_server_kinds() {
        assert_eq!(status(401).kind(), FailureKind::ClientStatus);
        assert_eq!(status(499).kind(), FailureKind::ClientStatus);
        assert_eq!(status(500).kind(), FailureKind::ServerStatus);
        assert_eq!(status(304).kind(), FailureKind::ServerStatus);
    }

    #[test]
    fn input_errors_are_invalid_input() {
        let url = RequestError::InvalidUrl {
            url: "nope".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        assert_eq!(url.kind(), FailureKind::InvalidInput);
        assert_eq!(
            RequestError::UnsupportedMethod("BREW".to_string()).kind(),
            FailureKind::InvalidInput
        );
    }

    #[test]
    fn lost_worker_counts_as_transport() {
        assert_eq!(RequestError::WorkerLost.kind(), FailureKind::Transport);
        assert_eq!(RequestError::WorkerLost.status(), None);
    }

    #[test]
    fn display_includes_status_and_body() {
        let err = RequestError::Status {
            status: 404,
            body: "{\"message\":\"missing\"}".to_string(),
            diagnostic: Some(Diagnostic::NotFound),
        };
        assert_eq!(err.to_string(), "HTTP 404: {\"message\":\"missing\"}");
        assert_eq!(err.diagnostic(), Some(Diagnostic::NotFound));
    }
}
