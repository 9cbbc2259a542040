//! Store decorator that logs every delegated call.

use super::{Selection, Store, StoreError};
use crate::batch::{BatchError, BatchOperation, BatchResult};
use crate::context::{CallContext, CancellationToken};
use portal_types::{ContentValues, Locator, RowSet};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, debug_span, warn};

/// Wraps a [`Store`] and emits a span plus one completion event per call.
///
/// Install with [`Gateway::traced`](crate::gateway::Gateway::traced), or
/// by hand:
///
/// ```ignore
/// let traced = TracingStore::new(Arc::clone(gateway.store()));
/// let gateway = gateway.with_store(Arc::new(traced));
/// ```
#[derive(Debug, Clone)]
pub struct TracingStore {
    inner: Arc<dyn Store>,
}

impl TracingStore {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self { inner }
    }

    /// The wrapped store.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn Store> {
        &self.inner
    }
}

fn traced<T, E, F>(op: &'static str, target: &dyn Display, cx: &CallContext, f: F) -> Result<T, E>
where
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    let caller = cx
        .current_identity()
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    let span = debug_span!("store", op, target = %target, caller = %caller);
    let _guard = span.enter();

    let started = Instant::now();
    let result = f();
    let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    match &result {
        Ok(_) => debug!(elapsed_us, "store call completed"),
        Err(e) => warn!(elapsed_us, error = %e, "store call failed"),
    }
    result
}

impl Store for TracingStore {
    fn query(
        &self,
        cx: &CallContext,
        locator: &Locator,
        projection: Option<&[String]>,
        selection: &Selection,
        cancel: Option<&CancellationToken>,
    ) -> Result<RowSet, StoreError> {
        traced("query", locator, cx, || {
            let rows = self.inner.query(cx, locator, projection, selection, cancel)?;
            debug!(rows = rows.row_count(), columns = rows.columns().len(), "query result");
            Ok(rows)
        })
    }

    fn get_type(&self, cx: &CallContext, locator: &Locator) -> Result<Option<String>, StoreError> {
        traced("get_type", locator, cx, || self.inner.get_type(cx, locator))
    }

    fn insert(
        &self,
        cx: &CallContext,
        locator: &Locator,
        values: &ContentValues,
    ) -> Result<Option<Locator>, StoreError> {
        traced("insert", locator, cx, || self.inner.insert(cx, locator, values))
    }

    fn update(
        &self,
        cx: &CallContext,
        locator: &Locator,
        values: &ContentValues,
        selection: &Selection,
    ) -> Result<usize, StoreError> {
        traced("update", locator, cx, || {
            self.inner.update(cx, locator, values, selection)
        })
    }

    fn delete(
        &self,
        cx: &CallContext,
        locator: &Locator,
        selection: &Selection,
    ) -> Result<usize, StoreError> {
        traced("delete", locator, cx, || self.inner.delete(cx, locator, selection))
    }

    fn bulk_insert(
        &self,
        cx: &CallContext,
        locator: &Locator,
        rows: &[ContentValues],
    ) -> Result<usize, StoreError> {
        traced("bulk_insert", locator, cx, || {
            self.inner.bulk_insert(cx, locator, rows)
        })
    }

    fn call(
        &self,
        cx: &CallContext,
        authority: &str,
        method: &str,
        arg: Option<&str>,
        extras: &ContentValues,
    ) -> Result<Option<ContentValues>, StoreError> {
        traced("call", &authority, cx, || {
            debug!(method, "provider call");
            self.inner.call(cx, authority, method, arg, extras)
        })
    }

    fn canonicalize(
        &self,
        cx: &CallContext,
        locator: &Locator,
    ) -> Result<Option<Locator>, StoreError> {
        traced("canonicalize", locator, cx, || self.inner.canonicalize(cx, locator))
    }

    fn uncanonicalize(
        &self,
        cx: &CallContext,
        locator: &Locator,
    ) -> Result<Option<Locator>, StoreError> {
        traced("uncanonicalize", locator, cx, || {
            self.inner.uncanonicalize(cx, locator)
        })
    }

    fn refresh(
        &self,
        cx: &CallContext,
        locator: &Locator,
        args: &ContentValues,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, StoreError> {
        traced("refresh", locator, cx, || {
            self.inner.refresh(cx, locator, args, cancel)
        })
    }

    fn apply_batch(
        &self,
        cx: &CallContext,
        authority: &str,
        ops: &[BatchOperation],
    ) -> Result<Vec<BatchResult>, BatchError> {
        traced("apply_batch", &authority, cx, || {
            debug!(operations = ops.len(), "batch");
            self.inner.apply_batch(cx, authority, ops)
        })
    }

    fn yield_point(&self, cx: &CallContext) {
        debug!("batch yield point");
        self.inner.yield_point(cx);
    }
}
