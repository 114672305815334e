//! Error handling for the station panel
//!
//! Three failure classes cross component boundaries, each with its own type:
//! - [`AdmissionError`]: validation failures, recoverable at the station
//! - [`BackendError`]: connectivity failures, retry-eligible
//! - [`Error::Queue`] / [`Error::Internal`]: invariant violations

use serde::{Deserialize, Serialize};

/// Result type alias for the station panel
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the station panel
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Admission validation failures (recoverable, queue unchanged)
    #[error("Admission rejected: {0}")]
    Admission(#[from] AdmissionError),

    /// Backend connectivity failures (retry-eligible, local state unchanged)
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Queue invariant violations (programming/integration errors)
    #[error("Queue error: {message}")]
    Queue { message: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new queue error
    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Validation failures produced by the admission protocol
///
/// Each variant corresponds to one backend error code. Display text is the
/// wire code; [`AdmissionError::operator_message`] carries the text shown
/// to the station operator.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionError {
    /// Token not recognized or expired
    #[error("INVALID_TOKEN")]
    InvalidToken,

    /// Presented token is not the station's current token
    #[error("TOKEN_MISMATCH")]
    TokenMismatch,

    /// Voter is not assigned to this station
    #[error("NOT_STATION_VOTER")]
    NotStationVoter,

    /// Voter has already completed voting
    #[error("ALREADY_VOTED")]
    AlreadyVoted,

    /// An active check-in entry already exists for this voter
    #[error("CHECKIN_EXISTS")]
    CheckinExists,
}

impl AdmissionError {
    /// Parse a backend error code into a typed variant
    ///
    /// Matching is substring-based and case-insensitive since backends wrap
    /// codes inside larger message strings.
    pub fn from_code(code: &str) -> Option<Self> {
        let upper = code.to_uppercase();
        if upper.contains("TOKEN_MISMATCH") {
            Some(Self::TokenMismatch)
        } else if upper.contains("INVALID_TOKEN") || upper.contains("INVALID_REGISTRATION") {
            Some(Self::InvalidToken)
        } else if upper.contains("NOT_STATION_VOTER") || upper.contains("NOT_TPS_VOTER") {
            Some(Self::NotStationVoter)
        } else if upper.contains("ALREADY_VOTED") {
            Some(Self::AlreadyVoted)
        } else if upper.contains("CHECKIN_EXISTS") {
            Some(Self::CheckinExists)
        } else {
            None
        }
    }

    /// Operator-facing message for this failure
    pub fn operator_message(&self) -> &'static str {
        match self {
            Self::InvalidToken => "Admission token is not valid or has expired.",
            Self::TokenMismatch => "Scanned token does not match this station's current token.",
            Self::NotStationVoter => "Voter is not assigned to this station.",
            Self::AlreadyVoted => "Voter has already cast a vote.",
            Self::CheckinExists => "Voter is already checked in at this station.",
        }
    }
}

/// Connectivity failures while talking to the backend
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend reports the station does not exist
    #[error("station not provisioned")]
    NotFound,

    /// Request exceeded the bounded timeout
    #[error("backend timeout after {0}s")]
    Timeout(u64),

    /// Transport-level failure (connection refused, DNS, TLS)
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// Response did not match the expected wire format
    #[error("unexpected backend response: {0}")]
    Protocol(String),
}

impl BackendError {
    /// Whether a retry of the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unreachable(_))
    }
}

/// Convenience macros for creating specific error types
#[macro_export]
macro_rules! queue_error {
    ($msg:expr) => {
        $crate::Error::queue($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::queue(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::Error::internal($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::internal(format!($fmt, $($arg)*))
    };
}
