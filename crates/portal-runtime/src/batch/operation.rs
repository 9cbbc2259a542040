//! Batch operations and their builder.

use super::engine::back_ref_to_value;
use super::{BatchError, BatchResult, OperationError};
use crate::context::CallContext;
use crate::store::{Selection, Store};
use portal_types::{ContentValues, Locator, Value};
use std::collections::BTreeMap;
use std::fmt;

/// What a [`BatchOperation`] does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Insert one row.
    Insert,
    /// Update matching rows.
    Update,
    /// Delete matching rows.
    Delete,
    /// Check rows against expected values and/or an expected count.
    Assert,
}

impl OperationKind {
    fn allows_values(self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Assert)
    }

    fn allows_selection(self) -> bool {
        matches!(self, Self::Update | Self::Delete | Self::Assert)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Assert => "assert",
        })
    }
}

/// One step of a batch.
///
/// Built with [`BatchOperation::insert`] and friends; invariants are
/// checked once by [`BatchOperationBuilder::build`].
///
/// # Example
///
/// ```
/// use portal_runtime::batch::BatchOperation;
/// use portal_types::Locator;
///
/// let items: Locator = "content://com.example.notes/items".parse().unwrap();
/// let tags: Locator = "content://com.example.notes/tags".parse().unwrap();
///
/// let ops = vec![
///     BatchOperation::insert(items).with_value("title", "groceries").build().unwrap(),
///     BatchOperation::insert(tags)
///         .with_value("name", "home")
///         .with_value_back_reference("item_id", 0)
///         .build()
///         .unwrap(),
/// ];
/// assert_eq!(ops.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOperation {
    kind: OperationKind,
    locator: Locator,
    values: ContentValues,
    value_back_refs: BTreeMap<String, usize>,
    selection: Option<String>,
    selection_args: Vec<String>,
    selection_back_refs: BTreeMap<usize, usize>,
    expected_count: Option<usize>,
    yield_allowed: bool,
    failure_allowed: bool,
}

impl BatchOperation {
    /// Starts an insert into `locator`.
    #[must_use]
    pub fn insert(locator: Locator) -> BatchOperationBuilder {
        BatchOperationBuilder::new(OperationKind::Insert, locator)
    }

    /// Starts an update of `locator`.
    #[must_use]
    pub fn update(locator: Locator) -> BatchOperationBuilder {
        BatchOperationBuilder::new(OperationKind::Update, locator)
    }

    /// Starts a delete of `locator`.
    #[must_use]
    pub fn delete(locator: Locator) -> BatchOperationBuilder {
        BatchOperationBuilder::new(OperationKind::Delete, locator)
    }

    /// Starts an assertion over `locator`.
    #[must_use]
    pub fn assert(locator: Locator) -> BatchOperationBuilder {
        BatchOperationBuilder::new(OperationKind::Assert, locator)
    }

    /// Kind of operation.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Target locator.
    #[must_use]
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// A copy targeting `locator` instead.
    #[must_use]
    pub fn with_locator(&self, locator: Locator) -> Self {
        Self {
            locator,
            ..self.clone()
        }
    }

    /// Static values.
    #[must_use]
    pub fn values(&self) -> &ContentValues {
        &self.values
    }

    /// Static selection clause.
    #[must_use]
    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// Declared expected count.
    #[must_use]
    pub fn expected_count(&self) -> Option<usize> {
        self.expected_count
    }

    /// Whether the store may yield before this operation.
    #[must_use]
    pub fn yield_allowed(&self) -> bool {
        self.yield_allowed
    }

    /// Whether a failure of this operation is recorded instead of
    /// aborting the batch.
    #[must_use]
    pub fn failure_allowed(&self) -> bool {
        self.failure_allowed
    }

    /// Assertions read.
    #[must_use]
    pub fn is_read_operation(&self) -> bool {
        self.kind == OperationKind::Assert
    }

    /// Inserts, updates and deletes write.
    #[must_use]
    pub fn is_write_operation(&self) -> bool {
        !self.is_read_operation()
    }

    /// Static values overlaid with resolved value back-references.
    ///
    /// # Errors
    ///
    /// Returns an [`OperationError`] for an unresolvable back-reference.
    pub fn resolve_values(&self, results: &[BatchResult]) -> Result<ContentValues, OperationError> {
        let mut values = self.values.clone();
        for (column, &index) in &self.value_back_refs {
            let value = back_ref_to_value(results, results.len(), index)?;
            values.put(column.clone(), Value::Integer(value));
        }
        Ok(values)
    }

    /// Static selection args overlaid with resolved selection
    /// back-references. Slots past the static args are padded with empty
    /// strings.
    ///
    /// # Errors
    ///
    /// Returns an [`OperationError`] for an unresolvable back-reference.
    pub fn resolve_selection_args(
        &self,
        results: &[BatchResult],
    ) -> Result<Vec<String>, OperationError> {
        let mut args = self.selection_args.clone();
        for (&slot, &index) in &self.selection_back_refs {
            let value = back_ref_to_value(results, results.len(), index)?;
            if slot >= args.len() {
                args.resize(slot + 1, String::new());
            }
            args[slot] = value.to_string();
        }
        Ok(args)
    }

    /// Applies this operation. `results` holds the results of every
    /// earlier operation in the batch.
    ///
    /// # Errors
    ///
    /// Returns an [`OperationError`] on back-reference, store, count or
    /// assertion failure.
    pub fn apply<S: Store + ?Sized>(
        &self,
        store: &S,
        cx: &CallContext,
        results: &[BatchResult],
    ) -> Result<BatchResult, OperationError> {
        let values = self.resolve_values(results)?;
        let selection = Selection {
            clause: self.selection.clone(),
            args: self.resolve_selection_args(results)?,
        };

        let count = match self.kind {
            OperationKind::Insert => {
                return match store.insert(cx, &self.locator, &values)? {
                    Some(locator) => Ok(BatchResult::Locator(locator)),
                    None => Err(OperationError::OperationFailed(format!(
                        "Insert into {} returned no result",
                        self.locator
                    ))),
                };
            }
            OperationKind::Update => store.update(cx, &self.locator, &values, &selection)?,
            OperationKind::Delete => store.delete(cx, &self.locator, &selection)?,
            OperationKind::Assert => self.check_assertion(store, cx, &values, &selection)?,
        };

        match self.expected_count {
            Some(expected) if expected != count => Err(OperationError::CountMismatch {
                locator: self.locator.clone(),
                expected,
                actual: count,
            }),
            _ => Ok(BatchResult::Count(count)),
        }
    }

    fn check_assertion<S: Store + ?Sized>(
        &self,
        store: &S,
        cx: &CallContext,
        values: &ContentValues,
        selection: &Selection,
    ) -> Result<usize, OperationError> {
        let projection: Option<Vec<String>> =
            (!values.is_empty()).then(|| values.columns().map(str::to_string).collect());

        let rows = store.query(cx, &self.locator, projection.as_deref(), selection, None)?;

        if let Some(columns) = &projection {
            for row in 0..rows.row_count() {
                for column in columns {
                    let actual = rows.text(row, column);
                    let expected = values.get_as_text(column);
                    if actual != expected {
                        return Err(OperationError::AssertionMismatch {
                            locator: self.locator.clone(),
                            column: column.clone(),
                            expected,
                            actual,
                        });
                    }
                }
            }
        }
        Ok(rows.row_count())
    }
}

/// Builder for [`BatchOperation`].
#[derive(Debug, Clone)]
#[must_use = "call build() to obtain the operation"]
pub struct BatchOperationBuilder {
    op: BatchOperation,
    selection_set: bool,
}

impl BatchOperationBuilder {
    fn new(kind: OperationKind, locator: Locator) -> Self {
        Self {
            op: BatchOperation {
                kind,
                locator,
                values: ContentValues::new(),
                value_back_refs: BTreeMap::new(),
                selection: None,
                selection_args: Vec::new(),
                selection_back_refs: BTreeMap::new(),
                expected_count: None,
                yield_allowed: false,
                failure_allowed: false,
            },
            selection_set: false,
        }
    }

    /// Merges `values` into the static values.
    pub fn with_values(mut self, values: ContentValues) -> Self {
        for (column, value) in values.iter() {
            self.op.values.put(column, value.clone());
        }
        self
    }

    /// Sets one static value.
    pub fn with_value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op.values.put(column, value);
        self
    }

    /// Sets `column` from the result of operation `index`.
    pub fn with_value_back_reference(mut self, column: impl Into<String>, index: usize) -> Self {
        self.op.value_back_refs.insert(column.into(), index);
        self
    }

    /// Sets the selection clause and its static args.
    pub fn with_selection<I, S>(mut self, clause: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.op.selection = Some(clause.into());
        self.op.selection_args = args.into_iter().map(Into::into).collect();
        self.selection_set = true;
        self
    }

    /// Sets selection arg `slot` from the result of operation `index`.
    pub fn with_selection_back_reference(mut self, slot: usize, index: usize) -> Self {
        self.op.selection_back_refs.insert(slot, index);
        self
    }

    /// Requires exactly `count` affected or matched rows.
    pub fn with_expected_count(mut self, count: usize) -> Self {
        self.op.expected_count = Some(count);
        self
    }

    /// Lets the store yield before this operation.
    pub fn with_yield_allowed(mut self, allowed: bool) -> Self {
        self.op.yield_allowed = allowed;
        self
    }

    /// Records a failure of this operation instead of aborting.
    pub fn with_failure_allowed(mut self, allowed: bool) -> Self {
        self.op.failure_allowed = allowed;
        self
    }

    /// Checks invariants and returns the operation.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::MalformedOperation`] when:
    ///
    /// - values or value back-references are set on a delete
    /// - a selection, selection back-reference or expected count is set on an insert
    /// - an update has neither values nor value back-references
    /// - an assert has no values, value back-references or expected count
    pub fn build(self) -> Result<BatchOperation, BatchError> {
        let op = self.op;
        let has_values = !op.values.is_empty() || !op.value_back_refs.is_empty();

        if has_values && !op.kind.allows_values() {
            return Err(BatchError::malformed(format!(
                "only inserts, updates and asserts can have values, got {} of {}",
                op.kind, op.locator
            )));
        }

        let has_selection =
            self.selection_set || !op.selection_back_refs.is_empty() || op.expected_count.is_some();
        if has_selection && !op.kind.allows_selection() {
            return Err(BatchError::malformed(format!(
                "only updates, deletes and asserts can have selections or expected counts, got {} of {}",
                op.kind, op.locator
            )));
        }

        match op.kind {
            OperationKind::Update if !has_values => Err(BatchError::malformed(format!(
                "empty values for update of {}",
                op.locator
            ))),
            OperationKind::Assert if !has_values && op.expected_count.is_none() => {
                Err(BatchError::malformed(format!(
                    "an assert of {} must have values or an expected count",
                    op.locator
                )))
            }
            _ => Ok(op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_types::ErrorCode;

    fn loc(s: &str) -> Locator {
        s.parse().expect("test locator should parse")
    }

    fn items() -> Locator {
        loc("content://notes/items")
    }

    fn assert_malformed(result: Result<BatchOperation, BatchError>) {
        let err = result.expect_err("builder should reject");
        assert_eq!(err.code(), "BATCH_MALFORMED_OPERATION", "got: {err}");
    }

    #[test]
    fn update_requires_values() {
        assert_malformed(BatchOperation::update(items()).build());
        assert!(BatchOperation::update(items()).with_value("a", 1).build().is_ok());
        assert!(BatchOperation::update(items())
            .with_value_back_reference("a", 0)
            .build()
            .is_ok());
    }

    #[test]
    fn assert_requires_values_or_count() {
        assert_malformed(BatchOperation::assert(items()).build());
        assert!(BatchOperation::assert(items()).with_expected_count(0).build().is_ok());
        assert!(BatchOperation::assert(items()).with_value("a", 1).build().is_ok());
    }

    #[test]
    fn delete_rejects_values() {
        assert_malformed(BatchOperation::delete(items()).with_value("a", 1).build());
        assert_malformed(
            BatchOperation::delete(items())
                .with_value_back_reference("a", 0)
                .build(),
        );
    }

    #[test]
    fn insert_rejects_selection_and_count() {
        assert_malformed(
            BatchOperation::insert(items())
                .with_selection("a = ?", ["1"])
                .build(),
        );
        assert_malformed(BatchOperation::insert(items()).with_expected_count(1).build());
        assert_malformed(
            BatchOperation::insert(items())
                .with_selection_back_reference(0, 0)
                .build(),
        );
    }

    #[test]
    fn insert_without_values_is_fine() {
        let op = BatchOperation::insert(items())
            .build()
            .expect("valid insert");
        assert!(op.is_write_operation());
        assert!(!op.is_read_operation());
    }

    #[test]
    fn resolve_values_overwrites_static_values() {
        let op = BatchOperation::insert(items())
            .with_value("a1", 5)
            .with_value("b", "x")
            .with_value_back_reference("a1", 0)
            .build()
            .expect("valid insert");
        let results = [BatchResult::Locator(loc("content://notes/items/19"))];

        let values = op.resolve_values(&results).expect("resolves");
        assert_eq!(values.get("a1"), Some(&Value::Integer(19)));
        assert_eq!(values.get_as_text("b").as_deref(), Some("x"));
    }

    #[test]
    fn resolve_selection_args_pads_missing_slots() {
        let op = BatchOperation::delete(items())
            .with_selection("a = ? AND b = ? AND c = ?", ["x"])
            .with_selection_back_reference(2, 0)
            .build()
            .expect("valid delete");

        let args = op
            .resolve_selection_args(&[BatchResult::Count(3)])
            .expect("resolves");
        assert_eq!(args, vec!["x".to_string(), String::new(), "3".to_string()]);
    }

    #[test]
    fn resolve_rejects_forward_reference() {
        let op = BatchOperation::insert(items())
            .with_value_back_reference("a", 1)
            .build()
            .expect("valid insert");
        let err = op.resolve_values(&[BatchResult::Count(1)]).unwrap_err();
        assert!(matches!(
            err,
            OperationError::BackReferenceOutOfRange { index: 1, available: 1 }
        ));
    }

    #[test]
    fn with_locator_keeps_everything_else() {
        let op = BatchOperation::update(loc("content://10@notes/items"))
            .with_value("a", 1)
            .with_failure_allowed(true)
            .build()
            .expect("valid update");
        let moved = op.with_locator(items());
        assert_eq!(moved.locator(), &items());
        assert_eq!(moved.values(), op.values());
        assert!(moved.failure_allowed());
    }
}
