//! The access-control gateway in front of a [`Store`].
//!
//! Every inbound call follows the same pipeline:
//!
//! ```text
//!   caller ──► validate_incoming ──► strip tenant ──► check_read / check_write
//!                   │                                      │
//!              AddressError         ┌──────────────────────┼──────────────────┐
//!                                   ▼                      ▼                  ▼
//!                                Allowed                Ignored            Errored
//!                                   │                      │                  │
//!                     enter(caller) + child token    synthesize result   AccessDenied
//!                                   │                (store untouched)
//!                                   ▼
//!                           store.<op>(stripped)
//!                                   │
//!                     re-attach caller's tenant to locators
//! ```
//!
//! # Degraded Results
//!
//! | Operation | Ignored result |
//! |-----------|----------------|
//! | `query` | zero rows over the requested (or store-reported) columns |
//! | `insert` | `<locator>/0` |
//! | `bulk_insert`, `update`, `delete` | `0` |
//! | `canonicalize` | `None` |
//! | `uncanonicalize` | the input locator |
//! | `refresh` | `false` |
//! | `apply_batch` | [`GatewayError::BatchPolicyIgnored`] |
//!
//! # Endpoint Loss
//!
//! When the store reports [`StoreError::RemoteEndpointLost`] and the
//! resource's channel is unstable, the configured [`ConnectionManager`] is
//! told before the error is returned.

mod error;

pub use error::GatewayError;

use crate::address;
use crate::auth::AuthorizationEngine;
use crate::batch::{BatchError, BatchOperation, BatchResult, OperationError};
use crate::context::{CallContext, CallScope, CancellationToken};
use crate::resource::ResourceDescriptor;
use crate::store::{Selection, Store, StoreError, TracingStore};
use portal_auth::{AccessDecision, AccessDenied, AccessKind, GrantMode};
use portal_types::{CallIdentity, ContentValues, Locator, RowSet, TenantId, Uid};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Receives notice that an unstable store endpoint went away.
pub trait ConnectionManager: Send + Sync + fmt::Debug {
    /// The endpoint serving `authority` was lost.
    fn unstable_endpoint_lost(&self, authority: &str);
}

/// A locator that passed address validation.
struct Inbound {
    /// Tenant-stripped target handed to the store.
    target: Locator,
    /// Tenant the caller addressed, re-attached to results.
    tenant: TenantId,
}

enum Admission {
    Proceed,
    Degrade,
}

/// Fronts one resource's store with address validation and
/// authorization.
///
/// # Example
///
/// ```
/// use portal_runtime::auth::{AuthorizationEngine, DefaultGrantTable, StaticPolicyOracle};
/// use portal_runtime::context::CallContext;
/// use portal_runtime::gateway::Gateway;
/// use portal_runtime::store::Selection;
/// use portal_runtime::testing::MemoryStore;
/// use portal_runtime::{AuthoritySet, ResourceDescriptor};
/// use portal_types::{CallIdentity, ContentValues, Pid, Uid};
/// use std::sync::Arc;
///
/// let oracle = Arc::new(StaticPolicyOracle::builder().build());
/// let engine = AuthorizationEngine::new(oracle.clone(), Arc::new(DefaultGrantTable::new()));
/// let resource = ResourceDescriptor::new(AuthoritySet::single("com.example.notes"), Uid::new(10_001));
/// let gateway = Gateway::new(resource, Arc::new(MemoryStore::new()), engine);
///
/// let cx = CallContext::new(oracle);
/// let caller = CallIdentity::new(Uid::new(10_050), Pid::new(3));
/// let items = "content://com.example.notes/items".parse().unwrap();
///
/// let row = gateway
///     .insert(&cx, &caller, &items, &ContentValues::new().with("title", "milk"))
///     .unwrap();
/// assert_eq!(row.unwrap().to_string(), "content://com.example.notes/items/1");
///
/// let rows = gateway.query(&cx, &caller, &items, None, &Selection::all(), None).unwrap();
/// assert_eq!(rows.row_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Gateway {
    resource: Arc<ResourceDescriptor>,
    store: Arc<dyn Store>,
    auth: AuthorizationEngine,
    connections: Option<Arc<dyn ConnectionManager>>,
}

impl Gateway {
    /// Creates a gateway for `resource` delegating to `store`.
    #[must_use]
    pub fn new(
        resource: ResourceDescriptor,
        store: Arc<dyn Store>,
        auth: AuthorizationEngine,
    ) -> Self {
        Self {
            resource: Arc::new(resource),
            store,
            auth,
            connections: None,
        }
    }

    /// Replaces the delegate store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = store;
        self
    }

    /// Wraps the current store in a [`TracingStore`].
    #[must_use]
    pub fn traced(self) -> Self {
        let inner = Arc::clone(&self.store);
        self.with_store(Arc::new(TracingStore::new(inner)))
    }

    /// Sets the manager told about lost endpoints.
    #[must_use]
    pub fn with_connection_manager(mut self, manager: Arc<dyn ConnectionManager>) -> Self {
        self.connections = Some(manager);
        self
    }

    /// The delegate store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The fronted resource.
    #[must_use]
    pub fn resource(&self) -> &ResourceDescriptor {
        &self.resource
    }

    /// The authorization engine.
    #[must_use]
    pub fn authorization(&self) -> &AuthorizationEngine {
        &self.auth
    }

    /// Queries rows.
    ///
    /// When policy suppresses the read, returns zero rows over the
    /// requested columns. With no projection, the store is queried under
    /// the resource owner's identity only to learn its columns.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] on address, authorization, store or
    /// cancellation failure.
    pub fn query(
        &self,
        cx: &CallContext,
        caller: &CallIdentity,
        locator: &Locator,
        projection: Option<&[String]>,
        selection: &Selection,
        cancel: Option<&CancellationToken>,
    ) -> Result<RowSet, GatewayError> {
        let inbound = self.inbound(locator)?;
        match self.admit(AccessKind::Read, &inbound.target, caller)? {
            Admission::Proceed => {
                let local = derive_cancel(cancel)?;
                let _scope = self.enter(cx, caller)?;
                self.finish(self.store.query(
                    cx,
                    &inbound.target,
                    projection,
                    selection,
                    local.as_ref(),
                ))
            }
            Admission::Degrade => match projection {
                Some(columns) => Ok(RowSet::new(columns.iter().cloned())),
                None => {
                    let _scope = cx.enter(self.resource.owner_identity());
                    let rows =
                        self.finish(self.store.query(cx, &inbound.target, None, selection, None))?;
                    Ok(RowSet::new(rows.columns().iter().cloned()))
                }
            },
        }
    }

    /// Type of the data at `locator`. Not permission-checked.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] on address or store failure.
    pub fn get_type(
        &self,
        cx: &CallContext,
        caller: &CallIdentity,
        locator: &Locator,
    ) -> Result<Option<String>, GatewayError> {
        let inbound = self.inbound(locator)?;
        let _scope = self.enter(cx, caller)?;
        self.finish(self.store.get_type(cx, &inbound.target))
    }

    /// Inserts a row and returns its locator, scoped to the caller's
    /// tenant.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] on address, authorization or store failure.
    pub fn insert(
        &self,
        cx: &CallContext,
        caller: &CallIdentity,
        locator: &Locator,
        values: &ContentValues,
    ) -> Result<Option<Locator>, GatewayError> {
        let inbound = self.inbound(locator)?;
        match self.admit(AccessKind::Write, &inbound.target, caller)? {
            Admission::Proceed => {
                let _scope = self.enter(cx, caller)?;
                let inserted = self.finish(self.store.insert(cx, &inbound.target, values))?;
                Ok(inserted.map(|l| address::with_tenant(&l, inbound.tenant)))
            }
            Admission::Degrade => Ok(Some(inbound.target.append_segment(0))),
        }
    }

    /// Inserts every row, returning how many were inserted.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] on address, authorization or store failure.
    pub fn bulk_insert(
        &self,
        cx: &CallContext,
        caller: &CallIdentity,
        locator: &Locator,
        rows: &[ContentValues],
    ) -> Result<usize, GatewayError> {
        let inbound = self.inbound(locator)?;
        match self.admit(AccessKind::Write, &inbound.target, caller)? {
            Admission::Proceed => {
                let _scope = self.enter(cx, caller)?;
                self.finish(self.store.bulk_insert(cx, &inbound.target, rows))
            }
            Admission::Degrade => Ok(0),
        }
    }

    /// Updates matching rows.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] on address, authorization or store failure.
    pub fn update(
        &self,
        cx: &CallContext,
        caller: &CallIdentity,
        locator: &Locator,
        values: &ContentValues,
        selection: &Selection,
    ) -> Result<usize, GatewayError> {
        let inbound = self.inbound(locator)?;
        match self.admit(AccessKind::Write, &inbound.target, caller)? {
            Admission::Proceed => {
                let _scope = self.enter(cx, caller)?;
                self.finish(self.store.update(cx, &inbound.target, values, selection))
            }
            Admission::Degrade => Ok(0),
        }
    }

    /// Deletes matching rows.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] on address, authorization or store failure.
    pub fn delete(
        &self,
        cx: &CallContext,
        caller: &CallIdentity,
        locator: &Locator,
        selection: &Selection,
    ) -> Result<usize, GatewayError> {
        let inbound = self.inbound(locator)?;
        match self.admit(AccessKind::Write, &inbound.target, caller)? {
            Admission::Proceed => {
                let _scope = self.enter(cx, caller)?;
                self.finish(self.store.delete(cx, &inbound.target, selection))
            }
            Admission::Degrade => Ok(0),
        }
    }

    /// Applies a batch atomically with respect to authorization: every
    /// operation is validated and checked before the store sees any of
    /// them.
    ///
    /// Assertions need read access, every other operation write access.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Address`] for a foreign authority or tenant
    /// - [`GatewayError::AccessDenied`] for an errored check
    /// - [`GatewayError::BatchPolicyIgnored`] for an ignored check
    /// - [`GatewayError::Batch`] when the store aborts the batch
    pub fn apply_batch(
        &self,
        cx: &CallContext,
        caller: &CallIdentity,
        authority: &str,
        ops: &[BatchOperation],
    ) -> Result<Vec<BatchResult>, GatewayError> {
        address::validate_authority_name(authority, &self.resource.authorities)?;

        let mut prepared = Vec::with_capacity(ops.len());
        let mut tenants = Vec::with_capacity(ops.len());
        for (index, op) in ops.iter().enumerate() {
            let inbound = self.inbound(op.locator())?;
            let kind = if op.is_read_operation() {
                AccessKind::Read
            } else {
                AccessKind::Write
            };
            if let Admission::Degrade = self.admit(kind, &inbound.target, caller)? {
                return Err(GatewayError::BatchPolicyIgnored {
                    index,
                    locator: inbound.target,
                });
            }
            prepared.push(op.with_locator(inbound.target));
            tenants.push(inbound.tenant);
        }

        let _scope = self.enter(cx, caller)?;
        let results = self.store.apply_batch(cx, authority, &prepared).map_err(|e| {
            if let BatchError::Aborted {
                source: OperationError::Store(store_err),
                ..
            } = &e
            {
                self.note_endpoint_loss(store_err);
            }
            GatewayError::from(e)
        })?;

        debug!(authority, operations = results.len(), "batch applied");
        Ok(results
            .into_iter()
            .zip(tenants)
            .map(|(result, tenant)| result.with_tenant(tenant))
            .collect())
    }

    /// Provider-defined method call. Only the authority is validated;
    /// the store enforces its own permissions.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] on address or store failure.
    pub fn call(
        &self,
        cx: &CallContext,
        caller: &CallIdentity,
        authority: &str,
        method: &str,
        arg: Option<&str>,
        extras: &ContentValues,
    ) -> Result<Option<ContentValues>, GatewayError> {
        address::validate_authority_name(authority, &self.resource.authorities)?;
        let _scope = self.enter(cx, caller)?;
        self.finish(self.store.call(cx, authority, method, arg, extras))
    }

    /// Stable form of `locator`, scoped to the caller's tenant.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] on address, authorization or store failure.
    pub fn canonicalize(
        &self,
        cx: &CallContext,
        caller: &CallIdentity,
        locator: &Locator,
    ) -> Result<Option<Locator>, GatewayError> {
        let inbound = self.inbound(locator)?;
        match self.admit(AccessKind::Read, &inbound.target, caller)? {
            Admission::Proceed => {
                let _scope = self.enter(cx, caller)?;
                let canonical = self.finish(self.store.canonicalize(cx, &inbound.target))?;
                Ok(canonical.map(|l| address::with_tenant(&l, inbound.tenant)))
            }
            Admission::Degrade => Ok(None),
        }
    }

    /// Inverse of [`canonicalize`](Self::canonicalize).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] on address, authorization or store failure.
    pub fn uncanonicalize(
        &self,
        cx: &CallContext,
        caller: &CallIdentity,
        locator: &Locator,
    ) -> Result<Option<Locator>, GatewayError> {
        let inbound = self.inbound(locator)?;
        match self.admit(AccessKind::Read, &inbound.target, caller)? {
            Admission::Proceed => {
                let _scope = self.enter(cx, caller)?;
                let local = self.finish(self.store.uncanonicalize(cx, &inbound.target))?;
                Ok(local.map(|l| address::with_tenant(&l, inbound.tenant)))
            }
            Admission::Degrade => Ok(Some(address::with_tenant(&inbound.target, inbound.tenant))),
        }
    }

    /// Asks the store to refresh `locator`. Returns the store's answer
    /// unchanged: `true` if a refresh was performed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] on address, authorization, store or
    /// cancellation failure.
    pub fn refresh(
        &self,
        cx: &CallContext,
        caller: &CallIdentity,
        locator: &Locator,
        args: &ContentValues,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, GatewayError> {
        let inbound = self.inbound(locator)?;
        match self.admit(AccessKind::Read, &inbound.target, caller)? {
            Admission::Proceed => {
                let local = derive_cancel(cancel)?;
                let _scope = self.enter(cx, caller)?;
                self.finish(self.store.refresh(cx, &inbound.target, args, local.as_ref()))
            }
            Admission::Degrade => Ok(false),
        }
    }

    /// Whether `uid` holds an explicit grant of `mode` on `locator`.
    ///
    /// A matching one-time grant is consumed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] on address or grant table failure.
    pub fn check_grant(
        &self,
        locator: &Locator,
        uid: Uid,
        mode: GrantMode,
    ) -> Result<bool, GatewayError> {
        let inbound = self.inbound(locator)?;
        Ok(self.auth.grants().has_grant(&inbound.target, uid, mode)?)
    }

    fn inbound(&self, locator: &Locator) -> Result<Inbound, GatewayError> {
        let validated = address::validate_incoming(locator, &self.resource)?;
        Ok(Inbound {
            tenant: address::tenant_of(&validated),
            target: address::strip_for_resource(&validated, self.resource.single_tenant),
        })
    }

    fn admit(
        &self,
        kind: AccessKind,
        target: &Locator,
        caller: &CallIdentity,
    ) -> Result<Admission, GatewayError> {
        match self.auth.check(kind, target, caller, &self.resource) {
            AccessDecision::Allowed => Ok(Admission::Proceed),
            AccessDecision::Ignored => {
                debug!(locator = %target, access = %kind, "degrading suppressed call");
                Ok(Admission::Degrade)
            }
            AccessDecision::Errored {
                missing_permission,
                hint,
            } => Err(AccessDenied {
                kind,
                locator: target.clone(),
                caller: caller.clone(),
                missing_permission,
                hint,
            }
            .into()),
        }
    }

    /// Pushes `caller` and verifies its asserted package. The frame is
    /// popped when the returned scope drops, including on error.
    fn enter<'a>(
        &self,
        cx: &'a CallContext,
        caller: &CallIdentity,
    ) -> Result<CallScope<'a>, GatewayError> {
        let scope = cx.enter(caller.clone());
        cx.current_package()?;
        Ok(scope)
    }

    fn finish<T>(&self, result: Result<T, StoreError>) -> Result<T, GatewayError> {
        result.map_err(|e| {
            self.note_endpoint_loss(&e);
            GatewayError::from(e)
        })
    }

    fn note_endpoint_loss(&self, err: &StoreError) {
        let StoreError::RemoteEndpointLost { authority } = err else {
            return;
        };
        if self.resource.stable_channel {
            return;
        }
        warn!(authority = authority.as_str(), "unstable store endpoint lost");
        if let Some(manager) = &self.connections {
            manager.unstable_endpoint_lost(authority);
        }
    }
}

/// Fails fast on a cancelled token, else derives a local child token.
fn derive_cancel(
    cancel: Option<&CancellationToken>,
) -> Result<Option<CancellationToken>, GatewayError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(GatewayError::Cancelled),
        Some(token) => Ok(Some(token.child())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_cancel_fails_fast() {
        let token = CancellationToken::new();
        assert!(matches!(derive_cancel(Some(&token)), Ok(Some(_))));
        assert!(matches!(derive_cancel(None), Ok(None)));

        token.cancel();
        assert!(matches!(derive_cancel(Some(&token)), Err(GatewayError::Cancelled)));
    }

    #[test]
    fn child_token_follows_parent() {
        let token = CancellationToken::new();
        let local = derive_cancel(Some(&token))
            .expect("not cancelled")
            .expect("token given");
        assert!(!local.is_cancelled());
        token.cancel();
        assert!(local.is_cancelled());
    }
}
