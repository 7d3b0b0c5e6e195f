use thiserror::Error;

pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

/// Expected outcomes of connection resolution that are not a success.
///
/// Ordinary connectivity failures never surface here from
/// `test_connection`; they are reported as `Ok(false)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("camera validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("no connection strategy supports camera {0}")]
    NoCandidate(String),

    #[error("no strategy passed connection test for camera {camera_id} (tried: {})", .tried.join(", "))]
    AllCandidatesFailed {
        camera_id: String,
        tried: Vec<String>,
    },

    #[error("{operation} is not supported by the {strategy} strategy")]
    Unsupported {
        strategy: String,
        operation: String,
    },

    #[error("strategy not found: {0}")]
    StrategyNotFound(String),

    #[error("strategy already registered: {0}")]
    DuplicateStrategy(String),

    #[error("camera {camera_id} is unreachable via {strategy}")]
    Unreachable { strategy: String, camera_id: String },

    #[error("connection resolution cancelled")]
    Cancelled,

    #[error("invalid connection info: {0}")]
    InvalidConnectionInfo(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    pub fn unsupported(strategy: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            strategy: strategy.into(),
            operation: operation.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Human-readable messages; one per violated rule for validation errors
    pub fn messages(&self) -> Vec<String> {
        match self {
            ConnectionError::Validation(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, ConnectionError::Unsupported { .. })
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionError::Validation(_) => "validation",
            ConnectionError::NoCandidate(_) => "no_candidate",
            ConnectionError::AllCandidatesFailed { .. } => "all_failed",
            ConnectionError::Unsupported { .. } => "unsupported",
            ConnectionError::StrategyNotFound(_) => "not_found",
            ConnectionError::DuplicateStrategy(_) => "duplicate",
            ConnectionError::Unreachable { .. } => "unreachable",
            ConnectionError::Cancelled => "cancelled",
            ConnectionError::InvalidConnectionInfo(_) => "invalid_info",
            ConnectionError::Transport(_) => "transport",
        }
    }
}

impl From<reqwest::Error> for ConnectionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ConnectionError::transport(format!("request timed out: {}", err))
        } else {
            ConnectionError::transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_are_preserved() {
        let err = ConnectionError::Validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.messages(), vec!["a", "b"]);
        assert_eq!(err.to_string(), "camera validation failed: a; b");
    }

    #[test]
    fn test_all_failed_lists_candidates() {
        let err = ConnectionError::AllCandidatesFailed {
            camera_id: "cam-1".to_string(),
            tried: vec!["ONVIF".to_string(), "RTSP".to_string()],
        };
        assert!(err.to_string().contains("ONVIF, RTSP"));
        assert_eq!(err.kind(), "all_failed");
        assert_eq!(err.messages().len(), 1);
    }

    #[test]
    fn test_unsupported_helper() {
        let err = ConnectionError::unsupported("RTSP", "snapshot capture");
        assert!(err.is_unsupported());
        assert_eq!(err.to_string(), "snapshot capture is not supported by the RTSP strategy");
    }
}
