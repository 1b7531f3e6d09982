//! Error types for the Tandem engine.

use crate::RecordType;
use thiserror::Error;

/// All possible errors from the Tandem engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed verb or payload, or a payload that cannot be resolved
    /// against the store's identifier scheme.
    #[error("invalid {verb} transform on '{record_type}': {reason}")]
    InvalidTransform {
        verb: String,
        record_type: RecordType,
        reason: String,
    },

    /// An identifier or lookup matched nothing.
    #[error("{record_type} not found: {key}")]
    NotFound { record_type: RecordType, key: String },

    /// Transport or server failure.
    #[error("backend error ({}) during {context}: {body}", status_label(.status))]
    Backend {
        status: Option<u16>,
        body: String,
        context: String,
    },
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "transport".to_string(),
    }
}

impl Error {
    pub(crate) fn invalid(
        verb: impl ToString,
        record_type: impl Into<RecordType>,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidTransform {
            verb: verb.to_string(),
            record_type: record_type.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(record_type: impl Into<RecordType>, key: impl ToString) -> Self {
        Error::NotFound {
            record_type: record_type.into(),
            key: key.to_string(),
        }
    }

    /// HTTP status attached to a backend error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Backend { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::not_found("planet", "abc");
        assert_eq!(err.to_string(), "planet not found: abc");

        let err = Error::invalid("patch", "planet", "missing identifier");
        assert_eq!(
            err.to_string(),
            "invalid patch transform on 'planet': missing identifier"
        );

        let err = Error::Backend {
            status: Some(500),
            body: "boom".into(),
            context: "POST /planets".into(),
        };
        assert_eq!(
            err.to_string(),
            "backend error (status 500) during POST /planets: boom"
        );
        assert_eq!(err.status(), Some(500));

        let err = Error::Backend {
            status: None,
            body: "connection refused".into(),
            context: "GET /planets".into(),
        };
        assert_eq!(
            err.to_string(),
            "backend error (transport) during GET /planets: connection refused"
        );
    }
}
