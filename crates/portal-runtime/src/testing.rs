//! Test doubles for the gateway's collaborators.
//!
//! - [`MemoryStore`]: in-memory [`Store`] that records every call
//! - [`RecordingOracle`]: [`PolicyOracle`] spy over a [`StaticPolicyOracle`]
//! - [`RecordingConnectionManager`]: counts lost-endpoint notifications
//!
//! # MemoryStore Addressing
//!
//! ```text
//! content://<authority>/<table>         → every row of <table>
//! content://<authority>/<table>/<id>    → the row with that _id
//! ```
//!
//! Selections support `col = ?` terms joined by `AND`.

use crate::auth::StaticPolicyOracle;
use crate::context::{CallContext, CancellationToken};
use crate::gateway::ConnectionManager;
use crate::store::{Selection, Store, StoreError};
use parking_lot::Mutex;
use portal_auth::{OpCode, PackageVerifier, Permission, PolicyMode, PolicyOracle};
use portal_types::{CallIdentity, ContentValues, Locator, PackageName, Pid, RowSet, Uid, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Row id column.
pub const ID_COLUMN: &str = "_id";

/// One call observed by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Store method name.
    pub op: &'static str,
    /// Target locator or authority.
    pub target: String,
    /// Innermost identity of the call context at the time of the call.
    pub caller: Option<CallIdentity>,
}

#[derive(Debug, Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, ContentValues>,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Table>,
    calls: Vec<RecordedCall>,
    fail_after: Option<(usize, StoreError)>,
    reject_inserts: bool,
    refresh_result: bool,
    yields: usize,
}

/// In-memory [`Store`] keyed by the first path segment.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row directly, bypassing call recording. Returns its id.
    pub fn seed(&self, table: &str, values: ContentValues) -> i64 {
        let mut state = self.state.lock();
        let table = state.tables.entry(table.to_string()).or_default();
        table.last_id += 1;
        table.rows.insert(table.last_id, values);
        table.last_id
    }

    /// Rows currently in `table`.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.state.lock().tables.get(table).map_or(0, |t| t.rows.len())
    }

    /// Every call seen so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Number of calls seen so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Method names of every call, in order.
    #[must_use]
    pub fn ops(&self) -> Vec<&'static str> {
        self.state.lock().calls.iter().map(|c| c.op).collect()
    }

    /// Makes the next call fail with `err`.
    pub fn fail_next(&self, err: StoreError) {
        self.fail_after(0, err);
    }

    /// Lets `skip` calls through, then fails the one after with `err`.
    pub fn fail_after(&self, skip: usize, err: StoreError) {
        self.state.lock().fail_after = Some((skip, err));
    }

    /// Makes inserts return no locator.
    pub fn set_reject_inserts(&self, reject: bool) {
        self.state.lock().reject_inserts = reject;
    }

    /// Value returned by [`Store::refresh`].
    pub fn set_refresh_result(&self, refreshed: bool) {
        self.state.lock().refresh_result = refreshed;
    }

    /// Number of batch yield points reached.
    #[must_use]
    pub fn yield_count(&self) -> usize {
        self.state.lock().yields
    }

    fn begin(
        &self,
        op: &'static str,
        target: &dyn std::fmt::Display,
        cx: &CallContext,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall {
            op,
            target: target.to_string(),
            caller: cx.current_identity(),
        });
        match state.fail_after.take() {
            Some((0, err)) => Err(err),
            Some((skip, err)) => {
                state.fail_after = Some((skip - 1, err));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn check_cancel(cancel: Option<&CancellationToken>) -> Result<(), StoreError> {
    if cancel.is_some_and(CancellationToken::is_cancelled) {
        Err(StoreError::Cancelled)
    } else {
        Ok(())
    }
}

/// `(table, row id)` addressed by `locator`.
fn address(locator: &Locator) -> Result<(String, Option<i64>), StoreError> {
    let mut segments = locator.path_segments();
    let table = segments
        .next()
        .ok_or_else(|| StoreError::failed(format!("no table in {locator}")))?
        .to_string();
    let id = match segments.next() {
        Some(s) => Some(
            s.parse()
                .map_err(|_| StoreError::failed(format!("bad row id in {locator}")))?,
        ),
        None => None,
    };
    Ok((table, id))
}

/// Parses `a = ? AND b = ?` into `[(a, arg0), (b, arg1)]`.
fn parse_selection(selection: &Selection) -> Result<Vec<(String, String)>, StoreError> {
    let Some(clause) = selection.clause.as_deref().filter(|c| !c.trim().is_empty()) else {
        return Ok(Vec::new());
    };

    let terms: Vec<&str> = clause.split(" AND ").collect();
    if terms.len() > selection.args.len() {
        return Err(StoreError::failed(format!(
            "selection '{clause}' needs {} args, got {}",
            terms.len(),
            selection.args.len()
        )));
    }

    terms
        .iter()
        .zip(&selection.args)
        .map(|(term, arg)| match term.split_once('=') {
            Some((column, placeholder)) if placeholder.trim() == "?" => {
                Ok((column.trim().to_string(), arg.clone()))
            }
            _ => Err(StoreError::failed(format!("unsupported selection term '{term}'"))),
        })
        .collect()
}

fn row_matches(id: i64, row: &ContentValues, filter: &[(String, String)]) -> bool {
    filter.iter().all(|(column, expected)| {
        let actual = if column == ID_COLUMN {
            Some(id.to_string())
        } else {
            row.get_as_text(column)
        };
        actual.as_deref() == Some(expected.as_str())
    })
}

impl Table {
    fn matching(&self, id: Option<i64>, filter: &[(String, String)]) -> Vec<i64> {
        self.rows
            .iter()
            .filter(|(row_id, row)| {
                id.map_or(true, |want| want == **row_id) && row_matches(**row_id, row, filter)
            })
            .map(|(row_id, _)| *row_id)
            .collect()
    }
}

impl Store for MemoryStore {
    fn query(
        &self,
        cx: &CallContext,
        locator: &Locator,
        projection: Option<&[String]>,
        selection: &Selection,
        cancel: Option<&CancellationToken>,
    ) -> Result<RowSet, StoreError> {
        self.begin("query", locator, cx)?;
        check_cancel(cancel)?;
        let (table_name, id) = address(locator)?;
        let filter = parse_selection(selection)?;

        let state = self.state.lock();
        let empty = Table::default();
        let table = state.tables.get(&table_name).unwrap_or(&empty);

        let columns: Vec<String> = match projection {
            Some(columns) => columns.to_vec(),
            None => {
                let names: BTreeSet<&str> = table.rows.values().flat_map(|v| v.columns()).collect();
                std::iter::once(ID_COLUMN)
                    .chain(names.into_iter().filter(|c| *c != ID_COLUMN))
                    .map(str::to_string)
                    .collect()
            }
        };

        let mut rows = RowSet::new(columns.iter().cloned());
        for row_id in table.matching(id, &filter) {
            let Some(values) = table.rows.get(&row_id) else {
                continue;
            };
            rows.push_row(
                columns
                    .iter()
                    .map(|c| {
                        if c == ID_COLUMN {
                            Value::Integer(row_id)
                        } else {
                            values.get(c).cloned().unwrap_or(Value::Null)
                        }
                    })
                    .collect(),
            );
        }
        Ok(rows)
    }

    fn get_type(&self, cx: &CallContext, locator: &Locator) -> Result<Option<String>, StoreError> {
        self.begin("get_type", locator, cx)?;
        let (table, id) = address(locator)?;
        let kind = if id.is_some() { "item" } else { "dir" };
        Ok(Some(format!("vnd.portal.{kind}/{table}")))
    }

    fn insert(
        &self,
        cx: &CallContext,
        locator: &Locator,
        values: &ContentValues,
    ) -> Result<Option<Locator>, StoreError> {
        self.begin("insert", locator, cx)?;
        let (table_name, _) = address(locator)?;

        let mut state = self.state.lock();
        if state.reject_inserts {
            return Ok(None);
        }
        let table = state.tables.entry(table_name).or_default();
        table.last_id += 1;
        table.rows.insert(table.last_id, values.clone());
        Ok(Some(locator.append_segment(table.last_id)))
    }

    fn update(
        &self,
        cx: &CallContext,
        locator: &Locator,
        values: &ContentValues,
        selection: &Selection,
    ) -> Result<usize, StoreError> {
        self.begin("update", locator, cx)?;
        let (table_name, id) = address(locator)?;
        let filter = parse_selection(selection)?;

        let mut state = self.state.lock();
        let Some(table) = state.tables.get_mut(&table_name) else {
            return Ok(0);
        };
        let matched = table.matching(id, &filter);
        for row_id in &matched {
            if let Some(row) = table.rows.get_mut(row_id) {
                for (column, value) in values.iter() {
                    row.put(column, value.clone());
                }
            }
        }
        Ok(matched.len())
    }

    fn delete(
        &self,
        cx: &CallContext,
        locator: &Locator,
        selection: &Selection,
    ) -> Result<usize, StoreError> {
        self.begin("delete", locator, cx)?;
        let (table_name, id) = address(locator)?;
        let filter = parse_selection(selection)?;

        let mut state = self.state.lock();
        let Some(table) = state.tables.get_mut(&table_name) else {
            return Ok(0);
        };
        let matched = table.matching(id, &filter);
        for row_id in &matched {
            table.rows.remove(row_id);
        }
        Ok(matched.len())
    }

    fn call(
        &self,
        cx: &CallContext,
        authority: &str,
        method: &str,
        arg: Option<&str>,
        extras: &ContentValues,
    ) -> Result<Option<ContentValues>, StoreError> {
        self.begin("call", &authority, cx)?;
        let mut reply = extras.clone().with("method", method);
        if let Some(arg) = arg {
            reply.put("arg", arg);
        }
        Ok(Some(reply))
    }

    fn canonicalize(
        &self,
        cx: &CallContext,
        locator: &Locator,
    ) -> Result<Option<Locator>, StoreError> {
        self.begin("canonicalize", locator, cx)?;
        let (_, id) = address(locator)?;
        Ok(id.map(|_| locator.clone()))
    }

    fn uncanonicalize(
        &self,
        cx: &CallContext,
        locator: &Locator,
    ) -> Result<Option<Locator>, StoreError> {
        self.begin("uncanonicalize", locator, cx)?;
        Ok(Some(locator.clone()))
    }

    fn refresh(
        &self,
        cx: &CallContext,
        locator: &Locator,
        _args: &ContentValues,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, StoreError> {
        self.begin("refresh", locator, cx)?;
        check_cancel(cancel)?;
        Ok(self.state.lock().refresh_result)
    }

    fn yield_point(&self, _cx: &CallContext) {
        self.state.lock().yields += 1;
    }
}

/// [`PolicyOracle`] spy: delegates to a [`StaticPolicyOracle`] and counts
/// every question asked.
#[derive(Debug, Default)]
pub struct RecordingOracle {
    inner: StaticPolicyOracle,
    calls: AtomicUsize,
}

impl RecordingOracle {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: StaticPolicyOracle) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    /// Questions asked so far, package checks included.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl PolicyOracle for RecordingOracle {
    fn permission_held(&self, permission: &Permission, pid: Pid, uid: Uid) -> bool {
        self.hit();
        self.inner.permission_held(permission, pid, uid)
    }

    fn op_for_permission(&self, permission: &Permission) -> OpCode {
        self.hit();
        self.inner.op_for_permission(permission)
    }

    fn policy_mode(&self, op: OpCode, uid: Uid, package: Option<&PackageName>) -> PolicyMode {
        self.hit();
        self.inner.policy_mode(op, uid, package)
    }
}

impl PackageVerifier for RecordingOracle {
    fn package_belongs_to(&self, package: &PackageName, uid: Uid) -> bool {
        self.hit();
        self.inner.package_belongs_to(package, uid)
    }
}

/// [`ConnectionManager`] that records every lost authority.
#[derive(Debug, Default)]
pub struct RecordingConnectionManager {
    lost: Mutex<Vec<String>>,
}

impl RecordingConnectionManager {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Authorities reported lost, in order.
    #[must_use]
    pub fn lost(&self) -> Vec<String> {
        self.lost.lock().clone()
    }
}

impl ConnectionManager for RecordingConnectionManager {
    fn unstable_endpoint_lost(&self, authority: &str) {
        self.lost.lock().push(authority.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cx() -> CallContext {
        CallContext::new(Arc::new(StaticPolicyOracle::default()))
    }

    fn loc(s: &str) -> Locator {
        s.parse().expect("test locator should parse")
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let cx = cx();
        let items = loc("content://notes/items");

        let first = store
            .insert(&cx, &items, &ContentValues::new().with("title", "a"))
            .expect("insert");
        let second = store
            .insert(&cx, &items, &ContentValues::new().with("title", "b"))
            .expect("insert");

        assert_eq!(first, Some(loc("content://notes/items/1")));
        assert_eq!(second, Some(loc("content://notes/items/2")));
        assert_eq!(store.row_count("items"), 2);
    }

    #[test]
    fn query_with_selection_and_id() {
        let store = MemoryStore::new();
        store.seed("items", ContentValues::new().with("title", "a").with("done", 1));
        store.seed("items", ContentValues::new().with("title", "b").with("done", 0));
        let cx = cx();

        let done = store
            .query(
                &cx,
                &loc("content://notes/items"),
                None,
                &Selection::new("done = ?", ["1"]),
                None,
            )
            .expect("query");
        assert_eq!(done.row_count(), 1);
        assert_eq!(done.columns(), ["_id", "done", "title"]);
        assert_eq!(done.text(0, "title").as_deref(), Some("a"));

        let second = store
            .query(&cx, &loc("content://notes/items/2"), None, &Selection::all(), None)
            .expect("query");
        assert_eq!(second.text(0, "title").as_deref(), Some("b"));
    }

    #[test]
    fn update_and_delete_count_matches() {
        let store = MemoryStore::new();
        store.seed("items", ContentValues::new().with("done", 0));
        store.seed("items", ContentValues::new().with("done", 0));
        let cx = cx();
        let items = loc("content://notes/items");

        let updated = store
            .update(&cx, &items, &ContentValues::new().with("done", 1), &Selection::all())
            .expect("update");
        assert_eq!(updated, 2);

        let deleted = store
            .delete(&cx, &loc("content://notes/items/1"), &Selection::all())
            .expect("delete");
        assert_eq!(deleted, 1);
        assert_eq!(store.row_count("items"), 1);
    }

    #[test]
    fn records_calls_and_injected_failures() {
        let store = MemoryStore::new();
        let cx = cx();
        store.fail_next(StoreError::failed("boom"));

        let err = store.get_type(&cx, &loc("content://notes/items")).unwrap_err();
        assert_eq!(err, StoreError::failed("boom"));
        assert!(store.get_type(&cx, &loc("content://notes/items")).is_ok());
        assert_eq!(store.ops(), vec!["get_type", "get_type"]);
    }

    #[test]
    fn cancelled_query_fails() {
        let store = MemoryStore::new();
        let token = CancellationToken::new();
        token.cancel();
        let err = store
            .query(&cx(), &loc("content://notes/items"), None, &Selection::all(), Some(&token))
            .unwrap_err();
        assert_eq!(err, StoreError::Cancelled);
    }

    #[test]
    fn unsupported_selection_fails() {
        let store = MemoryStore::new();
        let err = store
            .query(
                &cx(),
                &loc("content://notes/items"),
                None,
                &Selection::new("a LIKE ?", ["x"]),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Failed(_)));
    }

    #[test]
    fn recording_oracle_counts() {
        let oracle = RecordingOracle::default();
        assert!(!oracle.permission_held(&Permission::new("p"), Pid::new(1), Uid::new(1)));
        let _ = oracle.op_for_permission(&Permission::new("p"));
        assert_eq!(oracle.calls(), 2);
    }
}
