//! The store behind a gateway.
//!
//! [`Store`] is the delegate a [`Gateway`](crate::gateway::Gateway)
//! forwards authorized calls to. Locators reaching a store are already
//! validated and tenant-stripped; the store never sees a call the
//! gateway did not authorize.
//!
//! # Supplemented Operations
//!
//! Only `query`, `insert`, `update`, `delete` and `get_type` are
//! required. The rest have defaults:
//!
//! | Method | Default |
//! |--------|---------|
//! | [`bulk_insert`](Store::bulk_insert) | `insert` per row, counting non-`None` results |
//! | [`call`](Store::call) | `Ok(None)` |
//! | [`canonicalize`](Store::canonicalize) | `Ok(None)` |
//! | [`uncanonicalize`](Store::uncanonicalize) | the input locator |
//! | [`refresh`](Store::refresh) | `Ok(false)` |
//! | [`apply_batch`](Store::apply_batch) | [`BatchEngine::apply`] |
//! | [`yield_point`](Store::yield_point) | no-op |

mod traced;

pub use traced::TracingStore;

use crate::batch::{BatchEngine, BatchError, BatchOperation, BatchResult};
use crate::context::{CallContext, CancellationToken};
use portal_types::{ContentValues, ErrorCode, Locator, RowSet};
use std::fmt;
use thiserror::Error;

/// Errors a store reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store rejected or failed the operation.
    #[error("store failed: {0}")]
    Failed(String),

    /// The process hosting the store went away.
    #[error("remote endpoint for '{authority}' lost")]
    RemoteEndpointLost {
        /// Authority whose endpoint was lost.
        authority: String,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    /// Creates a [`StoreError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Failed(_) => "STORE_FAILED",
            Self::RemoteEndpointLost { .. } => "STORE_REMOTE_ENDPOINT_LOST",
            Self::Cancelled => "GATEWAY_CANCELLED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::RemoteEndpointLost { .. })
    }
}

/// A `WHERE`-style filter with positional `?` arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Filter clause, e.g. `"title = ? AND done = ?"`.
    pub clause: Option<String>,
    /// Positional arguments.
    pub args: Vec<String>,
}

impl Selection {
    /// No filter.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter with arguments.
    #[must_use]
    pub fn new<I, S>(clause: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            clause: Some(clause.into()),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Data source a gateway delegates to.
///
/// Every method receives the [`CallContext`] with the caller's frame
/// already pushed, so a store can read
/// [`current_package`](CallContext::current_package) to attribute work.
pub trait Store: Send + Sync + fmt::Debug {
    /// Returns rows matching `selection`. `projection: None` means every
    /// column.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on failure or cancellation.
    fn query(
        &self,
        cx: &CallContext,
        locator: &Locator,
        projection: Option<&[String]>,
        selection: &Selection,
        cancel: Option<&CancellationToken>,
    ) -> Result<RowSet, StoreError>;

    /// MIME-style type of the data at `locator`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on failure.
    fn get_type(&self, cx: &CallContext, locator: &Locator) -> Result<Option<String>, StoreError>;

    /// Inserts a row, returning its locator.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on failure.
    fn insert(
        &self,
        cx: &CallContext,
        locator: &Locator,
        values: &ContentValues,
    ) -> Result<Option<Locator>, StoreError>;

    /// Updates matching rows, returning how many changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on failure.
    fn update(
        &self,
        cx: &CallContext,
        locator: &Locator,
        values: &ContentValues,
        selection: &Selection,
    ) -> Result<usize, StoreError>;

    /// Deletes matching rows, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on failure.
    fn delete(
        &self,
        cx: &CallContext,
        locator: &Locator,
        selection: &Selection,
    ) -> Result<usize, StoreError>;

    /// Inserts every row, returning how many were inserted.
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError`]; earlier rows stay inserted.
    fn bulk_insert(
        &self,
        cx: &CallContext,
        locator: &Locator,
        rows: &[ContentValues],
    ) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for row in rows {
            if self.insert(cx, locator, row)?.is_some() {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Provider-defined method call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on failure.
    fn call(
        &self,
        _cx: &CallContext,
        _authority: &str,
        _method: &str,
        _arg: Option<&str>,
        _extras: &ContentValues,
    ) -> Result<Option<ContentValues>, StoreError> {
        Ok(None)
    }

    /// Stable form of `locator`, if the store has one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on failure.
    fn canonicalize(
        &self,
        _cx: &CallContext,
        _locator: &Locator,
    ) -> Result<Option<Locator>, StoreError> {
        Ok(None)
    }

    /// Inverse of [`canonicalize`](Self::canonicalize).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on failure.
    fn uncanonicalize(
        &self,
        _cx: &CallContext,
        locator: &Locator,
    ) -> Result<Option<Locator>, StoreError> {
        Ok(Some(locator.clone()))
    }

    /// Asks the store to refresh `locator`. Returns `true` if a refresh
    /// was performed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on failure or cancellation.
    fn refresh(
        &self,
        _cx: &CallContext,
        _locator: &Locator,
        _args: &ContentValues,
        _cancel: Option<&CancellationToken>,
    ) -> Result<bool, StoreError> {
        Ok(false)
    }

    /// Applies a batch. Stores with transactions override this to wrap
    /// the default in one.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] when an operation fails without
    /// `failure_allowed`.
    fn apply_batch(
        &self,
        cx: &CallContext,
        _authority: &str,
        ops: &[BatchOperation],
    ) -> Result<Vec<BatchResult>, BatchError> {
        BatchEngine::apply(self, cx, ops)
    }

    /// Hint that the batch engine reached an operation allowed to yield.
    fn yield_point(&self, _cx: &CallContext) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_types::assert_error_code;

    #[test]
    fn error_codes_and_recoverability() {
        let lost = StoreError::RemoteEndpointLost {
            authority: "a".into(),
        };
        assert_error_code(&lost, "STORE_");
        assert!(lost.is_recoverable());

        assert_error_code(&StoreError::failed("boom"), "STORE_");
        assert!(!StoreError::failed("boom").is_recoverable());

        assert_error_code(&StoreError::Cancelled, "GATEWAY_");
        assert!(!StoreError::Cancelled.is_recoverable());
    }

    #[test]
    fn selection_constructors() {
        assert_eq!(Selection::all().clause, None);
        let s = Selection::new("a = ?", ["1"]);
        assert_eq!(s.clause.as_deref(), Some("a = ?"));
        assert_eq!(s.args, vec!["1".to_string()]);
    }
}
