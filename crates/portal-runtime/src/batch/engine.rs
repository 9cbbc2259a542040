//! Sequential batch applier.

use super::{BatchError, BatchOperation, BatchResult, OperationError};
use crate::context::CallContext;
use crate::store::Store;
use tracing::{debug, warn};

/// Applies batches one operation at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchEngine;

impl BatchEngine {
    /// Applies `ops` in order, returning one result per operation.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Aborted`] at the first failing operation not
    /// marked `failure_allowed`. Effects of earlier operations remain.
    pub fn apply<S: Store + ?Sized>(
        store: &S,
        cx: &CallContext,
        ops: &[BatchOperation],
    ) -> Result<Vec<BatchResult>, BatchError> {
        let mut results = Vec::with_capacity(ops.len());

        for (index, op) in ops.iter().enumerate() {
            if index > 0 && op.yield_allowed() {
                store.yield_point(cx);
            }

            match op.apply(store, cx, &results) {
                Ok(result) => {
                    debug!(
                        index,
                        kind = %op.kind(),
                        locator = %op.locator(),
                        %result,
                        "batch operation applied"
                    );
                    results.push(result);
                }
                Err(e) if op.failure_allowed() => {
                    warn!(
                        index,
                        kind = %op.kind(),
                        locator = %op.locator(),
                        error = %e,
                        "batch operation failed, continuing"
                    );
                    results.push(BatchResult::Failure(e.to_string()));
                }
                Err(source) => {
                    warn!(
                        index,
                        kind = %op.kind(),
                        locator = %op.locator(),
                        error = %source,
                        "batch aborted"
                    );
                    return Err(BatchError::Aborted {
                        index,
                        completed: results,
                        source,
                    });
                }
            }
        }

        Ok(results)
    }
}

/// Numeric value of result `index`, considering only the first `up_to`
/// results.
///
/// # Errors
///
/// - [`OperationError::BackReferenceOutOfRange`] if `index >= up_to`
/// - [`OperationError::UnresolvableBackReference`] for a locator with no
///   trailing id, or a failure result
pub fn back_ref_to_value(
    results: &[BatchResult],
    up_to: usize,
    index: usize,
) -> Result<i64, OperationError> {
    let available = up_to.min(results.len());
    if index >= available {
        return Err(OperationError::BackReferenceOutOfRange { index, available });
    }

    match &results[index] {
        BatchResult::Locator(locator) => {
            locator
                .trailing_id()
                .ok_or_else(|| OperationError::UnresolvableBackReference {
                    index,
                    reason: format!("{locator} has no trailing id"),
                })
        }
        BatchResult::Count(n) => {
            i64::try_from(*n).map_err(|_| OperationError::UnresolvableBackReference {
                index,
                reason: format!("count {n} out of range"),
            })
        }
        BatchResult::Failure(message) => Err(OperationError::UnresolvableBackReference {
            index,
            reason: format!("operation failed: {message}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_types::Locator;

    fn loc(s: &str) -> Locator {
        s.parse().expect("test locator should parse")
    }

    #[test]
    fn back_ref_kinds() {
        let results = [
            BatchResult::Locator(loc("content://notes/items/19")),
            BatchResult::Count(4),
            BatchResult::Locator(loc("content://notes/items")),
            BatchResult::Failure("boom".into()),
        ];

        assert_eq!(back_ref_to_value(&results, 4, 0), Ok(19));
        assert_eq!(back_ref_to_value(&results, 4, 1), Ok(4));
        assert!(matches!(
            back_ref_to_value(&results, 4, 2),
            Err(OperationError::UnresolvableBackReference { index: 2, .. })
        ));
        assert!(matches!(
            back_ref_to_value(&results, 4, 3),
            Err(OperationError::UnresolvableBackReference { index: 3, .. })
        ));
    }

    #[test]
    fn back_ref_bound_is_up_to() {
        let results = [BatchResult::Count(1), BatchResult::Count(2)];
        assert_eq!(
            back_ref_to_value(&results, 1, 1),
            Err(OperationError::BackReferenceOutOfRange { index: 1, available: 1 })
        );
        assert_eq!(back_ref_to_value(&results, 2, 1), Ok(2));
    }
}
