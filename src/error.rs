//! Error types shared by the service adapters and the planner.

use thiserror::Error;

/// Failure of a single request against an external routing service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned HTTP {status}")]
    Status { status: u16 },

    #[error("service rejected request: {code} ({message})")]
    Rejected { code: String, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no route found")]
    NoRoute,
}

impl ServiceError {
    /// Timeouts, connection failures, 429 and 5xx are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Transport(err) => {
                err.is_timeout() || err.is_connect() || err.is_request()
            }
            ServiceError::Status { status } => *status == 429 || (500..600).contains(status),
            ServiceError::Rejected { .. } | ServiceError::Malformed(_) | ServiceError::NoRoute => {
                false
            }
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Malformed(err.to_string())
    }
}

/// Planning request refused before any work was done.
#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("too many sites ({count}) for one planning request, limit is {limit}")]
    TooManySites { count: usize, limit: usize },

    #[error("site {id} has non-finite coordinates")]
    InvalidCoordinate { id: String },
}

/// Invalid environment configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("unknown travel profile {0:?}")]
    UnknownProfile(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_and_server_errors_are_transient() {
        assert!(ServiceError::Status { status: 429 }.is_transient());
        assert!(ServiceError::Status { status: 503 }.is_transient());
        assert!(!ServiceError::Status { status: 400 }.is_transient());
    }

    #[test]
    fn test_rejections_are_not_retried() {
        let err = ServiceError::Rejected {
            code: "InvalidQuery".to_string(),
            message: "bad coordinates".to_string(),
        };
        assert!(!err.is_transient());
        assert!(!ServiceError::Malformed("x".to_string()).is_transient());
        assert!(!ServiceError::NoRoute.is_transient());
    }
}
