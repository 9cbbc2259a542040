//! Batch errors.

use super::BatchResult;
use crate::store::StoreError;
use portal_types::{ErrorCode, Locator};
use thiserror::Error;

/// Failure of a single operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// A back-reference points at or past the current operation.
    #[error("asked for back reference {index} but there are only {available} results")]
    BackReferenceOutOfRange {
        /// Requested result index.
        index: usize,
        /// Results available.
        available: usize,
    },

    /// The referenced result has no numeric value.
    #[error("back reference {index} cannot be resolved: {reason}")]
    UnresolvableBackReference {
        /// Requested result index.
        index: usize,
        /// Why it cannot be resolved.
        reason: String,
    },

    /// The store reported no result where one was required.
    #[error("{0}")]
    OperationFailed(String),

    /// An expected count was not met.
    #[error("wrong number of rows for {locator}: expected {expected}, got {actual}")]
    CountMismatch {
        /// Target of the operation.
        locator: Locator,
        /// Declared count.
        expected: usize,
        /// Observed count.
        actual: usize,
    },

    /// An asserted column held an unexpected value.
    #[error(
        "found value {} when expected {} for column '{column}' of {locator}",
        display_opt(.actual),
        display_opt(.expected)
    )]
    AssertionMismatch {
        /// Target of the assertion.
        locator: Locator,
        /// Column compared.
        column: String,
        /// Expected string form.
        expected: Option<String>,
        /// Observed string form.
        actual: Option<String>,
    },

    /// The store failed the call.
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn display_opt(value: &Option<String>) -> String {
    value.as_deref().map_or_else(|| "null".to_string(), |v| format!("'{v}'"))
}

impl ErrorCode for OperationError {
    fn code(&self) -> &'static str {
        match self {
            Self::BackReferenceOutOfRange { .. } => "BATCH_BACK_REFERENCE_OUT_OF_RANGE",
            Self::UnresolvableBackReference { .. } => "BATCH_BACK_REFERENCE_UNRESOLVABLE",
            Self::OperationFailed(_) => "BATCH_OPERATION_FAILED",
            Self::CountMismatch { .. } => "BATCH_COUNT_MISMATCH",
            Self::AssertionMismatch { .. } => "BATCH_ASSERTION_MISMATCH",
            Self::Store(e) => e.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

/// Failure of a whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// An operation violated a builder invariant.
    #[error("malformed operation: {0}")]
    MalformedOperation(String),

    /// An operation failed without `failure_allowed`.
    #[error("batch aborted at operation {index}: {source}")]
    Aborted {
        /// Index of the failing operation.
        index: usize,
        /// Results of the operations before it.
        completed: Vec<BatchResult>,
        /// Why it failed.
        #[source]
        source: OperationError,
    },
}

impl BatchError {
    /// Creates a [`BatchError::MalformedOperation`].
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedOperation(message.into())
    }

    /// Results completed before the abort, empty for malformed operations.
    #[must_use]
    pub fn completed(&self) -> &[BatchResult] {
        match self {
            Self::Aborted { completed, .. } => completed,
            Self::MalformedOperation(_) => &[],
        }
    }
}

impl ErrorCode for BatchError {
    fn code(&self) -> &'static str {
        match self {
            Self::MalformedOperation(_) => "BATCH_MALFORMED_OPERATION",
            Self::Aborted { source, .. } => source.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::MalformedOperation(_) => false,
            Self::Aborted { source, .. } => source.is_recoverable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_types::assert_error_codes;

    fn loc() -> Locator {
        "content://notes/items".parse().expect("locator")
    }

    #[test]
    fn operation_error_codes() {
        assert_error_codes(
            &[
                OperationError::BackReferenceOutOfRange { index: 3, available: 1 },
                OperationError::UnresolvableBackReference {
                    index: 0,
                    reason: "no id".into(),
                },
                OperationError::OperationFailed("x".into()),
                OperationError::CountMismatch {
                    locator: loc(),
                    expected: 1,
                    actual: 0,
                },
                OperationError::AssertionMismatch {
                    locator: loc(),
                    column: "a".into(),
                    expected: Some("1".into()),
                    actual: None,
                },
            ],
            "BATCH_",
        );
    }

    #[test]
    fn batch_error_codes_follow_source() {
        assert_eq!(BatchError::malformed("x").code(), "BATCH_MALFORMED_OPERATION");
        let aborted = BatchError::Aborted {
            index: 0,
            completed: vec![],
            source: OperationError::Store(StoreError::RemoteEndpointLost {
                authority: "notes".into(),
            }),
        };
        assert_eq!(aborted.code(), "STORE_REMOTE_ENDPOINT_LOST");
        assert!(aborted.is_recoverable());
    }

    #[test]
    fn assertion_message_renders_null() {
        let err = OperationError::AssertionMismatch {
            locator: loc(),
            column: "title".into(),
            expected: Some("a".into()),
            actual: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("found value null when expected 'a'"), "got: {msg}");
    }
}
