//! The layered access decision.

use crate::address;
use crate::resource::ResourceDescriptor;
use portal_auth::{
    AccessDecision, AccessKind, AccessMode, GrantMode, GrantTable, OpCode, Permission,
    PolicyMode, PolicyOracle,
};
use portal_types::{CallIdentity, Locator};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Computes [`AccessDecision`]s for reads and writes.
///
/// # Decision Order
///
/// ```text
/// 1. caller is the owning application             → Allowed
/// 2. exported ∧ same tenant (or may cross tenants)?
///    ├── component permission held                → Allowed
///    ├── first matching path rule held            → Allowed
///    └── nothing declared for this mode           → Allowed
/// 3. explicit grant on this locator               → Allowed
/// 4. strongest denial was Ignored                 → Ignored
/// 5. otherwise                                    → Errored
/// ```
///
/// A path rule that matches and denies revokes the "nothing declared"
/// fallback of step 2.
///
/// # Example
///
/// ```
/// use portal_auth::{PathPattern, PathRule, PermissionDeclaration};
/// use portal_runtime::auth::{AuthorizationEngine, DefaultGrantTable, StaticPolicyOracle};
/// use portal_runtime::{AuthoritySet, ResourceDescriptor};
/// use portal_types::{CallIdentity, Locator, Pid, Uid};
/// use std::sync::Arc;
///
/// let resource = ResourceDescriptor::new(AuthoritySet::single("com.example.notes"), Uid::new(10_001))
///     .with_declaration(PermissionDeclaration::open().with_rule(
///         PathRule::new(PathPattern::glob("/private/*").unwrap()).read("notes.PRIVATE"),
///     ));
/// let engine = AuthorizationEngine::new(
///     Arc::new(StaticPolicyOracle::builder().build()),
///     Arc::new(DefaultGrantTable::new()),
/// );
/// let caller = CallIdentity::new(Uid::new(10_050), Pid::new(3));
///
/// let private: Locator = "content://com.example.notes/private/42".parse().unwrap();
/// let public: Locator = "content://com.example.notes/public/1".parse().unwrap();
/// assert!(engine.check_read(&private, &caller, &resource).is_errored());
/// assert!(engine.check_read(&public, &caller, &resource).is_allowed());
/// ```
#[derive(Debug, Clone)]
pub struct AuthorizationEngine {
    oracle: Arc<dyn PolicyOracle>,
    grants: Arc<dyn GrantTable>,
}

impl AuthorizationEngine {
    /// Creates an engine over `oracle` and `grants`.
    #[must_use]
    pub fn new(oracle: Arc<dyn PolicyOracle>, grants: Arc<dyn GrantTable>) -> Self {
        Self { oracle, grants }
    }

    /// The grant table consulted in the last layer.
    #[must_use]
    pub fn grants(&self) -> &Arc<dyn GrantTable> {
        &self.grants
    }

    /// Decides whether `caller` may read `locator`.
    #[must_use]
    pub fn check_read(
        &self,
        locator: &Locator,
        caller: &CallIdentity,
        resource: &ResourceDescriptor,
    ) -> AccessDecision {
        self.check(AccessKind::Read, locator, caller, resource)
    }

    /// Decides whether `caller` may write `locator`.
    #[must_use]
    pub fn check_write(
        &self,
        locator: &Locator,
        caller: &CallIdentity,
        resource: &ResourceDescriptor,
    ) -> AccessDecision {
        self.check(AccessKind::Write, locator, caller, resource)
    }

    /// Decides `kind` access and writes the audit log line.
    #[must_use]
    pub fn check(
        &self,
        kind: AccessKind,
        locator: &Locator,
        caller: &CallIdentity,
        resource: &ResourceDescriptor,
    ) -> AccessDecision {
        let decision = self.decide(kind, locator, caller, resource);
        let package = caller.package.as_ref().map_or("-", |p| p.as_str());

        match &decision {
            AccessDecision::Allowed => debug!(
                uid = %caller.uid,
                package,
                locator = %locator,
                access = %kind,
                "access allowed"
            ),
            AccessDecision::Ignored => warn!(
                uid = %caller.uid,
                package,
                locator = %locator,
                access = %kind,
                "access ignored"
            ),
            AccessDecision::Errored {
                missing_permission,
                hint,
            } => warn!(
                uid = %caller.uid,
                package,
                locator = %locator,
                access = %kind,
                missing = ?missing_permission.as_ref().map(Permission::as_str),
                hint = %hint,
                "access denied"
            ),
        }

        decision
    }

    fn decide(
        &self,
        kind: AccessKind,
        locator: &Locator,
        caller: &CallIdentity,
        resource: &ResourceDescriptor,
    ) -> AccessDecision {
        if caller.uid.is_same_app(resource.owner_uid) {
            return AccessDecision::Allowed;
        }

        let mut missing: Option<Permission> = None;
        let mut strongest = AccessMode::Allowed;

        if resource.exported && self.passes_tenant_check(caller, resource) {
            let overlay = resource.overlay_op(kind);
            let component = resource.declaration.component_permission(kind);
            let mut allow_default = component.is_none();

            if let Some(permission) = component {
                let mode = self.check_permission_and_app_op(permission, caller, overlay);
                if mode.is_allowed() {
                    return AccessDecision::Allowed;
                }
                missing = Some(permission.clone());
                strongest = strongest.strongest(mode);
            }

            for (rule, permission) in resource.declaration.matching_rules(locator.path(), kind) {
                let mode = self.check_permission_and_app_op(permission, caller, overlay);
                if mode.is_allowed() {
                    return AccessDecision::Allowed;
                }
                debug!(
                    pattern = rule.pattern.as_str(),
                    permission = %permission,
                    mode = %mode,
                    "path rule denied"
                );
                allow_default = false;
                missing = Some(permission.clone());
                strongest = strongest.strongest(mode);
            }

            if allow_default {
                return AccessDecision::Allowed;
            }
        }

        let grant_locator = if resource.single_tenant && caller.tenant() != resource.tenant {
            address::with_tenant(locator, caller.tenant())
        } else {
            locator.clone()
        };
        match self.grants.has_grant(&grant_locator, caller.uid, GrantMode::from(kind)) {
            Ok(true) => return AccessDecision::Allowed,
            Ok(false) => {}
            Err(e) => error!("authorization: grant lookup failed: {e}"),
        }

        if strongest == AccessMode::Ignored {
            return AccessDecision::Ignored;
        }

        let hint = match (&missing, resource.exported) {
            (Some(permission), true) => format!("requires {permission}, or an explicit grant"),
            (None, true) => format!(
                "requires {}, or an explicit grant",
                resource.cross_tenant_permission
            ),
            (_, false) => "requires the resource be exported, or an explicit grant".to_string(),
        };
        AccessDecision::Errored {
            missing_permission: missing,
            hint,
        }
    }

    fn passes_tenant_check(&self, caller: &CallIdentity, resource: &ResourceDescriptor) -> bool {
        caller.tenant() == resource.tenant
            || resource.single_tenant
            || self
                .oracle
                .permission_held(&resource.cross_tenant_permission, caller.pid, caller.uid)
    }

    /// Checks one permission plus its app-policy op, then the overlay op.
    ///
    /// ```text
    /// permission not held            → Errored
    /// op(permission) == NONE         → Allowed
    /// otherwise                      → mode(op)           (Default ⇒ Ignored)
    /// overlay != NONE                → mode(overlay)      (replaces the above)
    /// ```
    #[must_use]
    pub fn check_permission_and_app_op(
        &self,
        permission: &Permission,
        caller: &CallIdentity,
        overlay: OpCode,
    ) -> AccessMode {
        if !self.oracle.permission_held(permission, caller.pid, caller.uid) {
            return AccessMode::Errored;
        }

        let op = self.oracle.op_for_permission(permission);
        let mut mode = if op.is_none() {
            AccessMode::Allowed
        } else {
            self.op_mode(op, caller)
        };

        if !overlay.is_none() {
            mode = self.op_mode(overlay, caller);
        }
        mode
    }

    fn op_mode(&self, op: OpCode, caller: &CallIdentity) -> AccessMode {
        match self.oracle.policy_mode(op, caller.uid, caller.package.as_ref()) {
            PolicyMode::Allowed => AccessMode::Allowed,
            PolicyMode::Ignored | PolicyMode::Default => AccessMode::Ignored,
            PolicyMode::Errored => AccessMode::Errored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{DefaultGrantTable, StaticPolicyOracle};
    use crate::resource::AuthoritySet;
    use portal_auth::{LocatorGrant, PathPattern, PathRule, PermissionDeclaration};
    use portal_types::{Pid, TenantId, Uid};

    const OWNER: Uid = Uid::new(10_001);
    const CALLER: Uid = Uid::new(10_050);

    fn loc(s: &str) -> Locator {
        s.parse().expect("test locator should parse")
    }

    fn caller() -> CallIdentity {
        CallIdentity::new(CALLER, Pid::new(7))
    }

    fn resource(decl: PermissionDeclaration) -> ResourceDescriptor {
        ResourceDescriptor::new(AuthoritySet::single("notes"), OWNER).with_declaration(decl)
    }

    fn build_engine(oracle: StaticPolicyOracle) -> (AuthorizationEngine, Arc<DefaultGrantTable>) {
        let grants = Arc::new(DefaultGrantTable::new());
        let grants_dyn: Arc<dyn GrantTable> = grants.clone();
        (AuthorizationEngine::new(Arc::new(oracle), grants_dyn), grants)
    }

    #[test]
    fn owner_bypasses_everything() {
        let (engine, _) = build_engine(StaticPolicyOracle::builder().build());
        let res = resource(PermissionDeclaration::open().with_read("R")).exported(false);
        let owner_uid = Uid::of(TenantId::new(10), OWNER.app_id()).expect("uid in range");
        let owner_other_tenant = CallIdentity::new(owner_uid, Pid::new(1));

        assert!(engine
            .check_read(&loc("content://notes/x"), &owner_other_tenant, &res)
            .is_allowed());
    }

    #[test]
    fn open_resource_allows_by_default() {
        let (engine, _) = build_engine(StaticPolicyOracle::builder().build());
        let res = resource(PermissionDeclaration::open());
        assert!(engine.check_write(&loc("content://notes/x"), &caller(), &res).is_allowed());
    }

    #[test]
    fn component_permission_required() {
        let res = resource(PermissionDeclaration::open().with_read("R"));

        let (without, _) = build_engine(StaticPolicyOracle::builder().build());
        let denied = without.check_read(&loc("content://notes/x"), &caller(), &res);
        assert_eq!(denied.missing_permission(), Some(&Permission::new("R")));
        assert!(matches!(
            &denied,
            AccessDecision::Errored { hint, .. } if hint == "requires R, or an explicit grant"
        ));

        let (with, _) = build_engine(StaticPolicyOracle::builder().hold(CALLER, "R").build());
        assert!(with.check_read(&loc("content://notes/x"), &caller(), &res).is_allowed());
        // Write is undeclared and therefore open.
        assert!(without.check_write(&loc("content://notes/x"), &caller(), &res).is_allowed());
    }

    #[test]
    fn path_rule_grants_when_component_denies() {
        let res = resource(
            PermissionDeclaration::open()
                .with_read("R")
                .with_rule(PathRule::new(PathPattern::prefix("/shared")).read("S")),
        );
        let (engine, _) = build_engine(StaticPolicyOracle::builder().hold(CALLER, "S").build());

        assert!(engine.check_read(&loc("content://notes/shared/1"), &caller(), &res).is_allowed());
        assert!(engine.check_read(&loc("content://notes/other"), &caller(), &res).is_errored());
    }

    #[test]
    fn denied_path_rule_revokes_default_allow() {
        let res = resource(
            PermissionDeclaration::open()
                .with_rule(PathRule::new(PathPattern::prefix("/p")).read("P"))
                .with_rule(PathRule::new(PathPattern::prefix("/p")).write("W")),
        );
        let (engine, _) = build_engine(StaticPolicyOracle::builder().build());

        let decision = engine.check_read(&loc("content://notes/p/1"), &caller(), &res);
        assert_eq!(decision.missing_permission(), Some(&Permission::new("P")));
        assert!(engine.check_read(&loc("content://notes/q"), &caller(), &res).is_allowed());
    }

    #[test]
    fn latest_denial_names_missing_permission_strongest_wins() {
        let res = resource(
            PermissionDeclaration::open()
                .with_rule(PathRule::new(PathPattern::prefix("/p")).read("A"))
                .with_rule(PathRule::new(PathPattern::prefix("/p")).read("B")),
        );
        // A is held but its op is ignored; B is not held.
        let oracle = StaticPolicyOracle::builder()
            .hold(CALLER, "A")
            .map_op("A", OpCode::new(1))
            .set_mode(OpCode::new(1), PolicyMode::Ignored)
            .build();
        let (engine, _) = build_engine(oracle);

        let decision = engine.check_read(&loc("content://notes/p/1"), &caller(), &res);
        assert!(decision.is_errored());
        assert_eq!(decision.missing_permission(), Some(&Permission::new("B")));
    }

    #[test]
    fn ignored_when_every_denial_is_soft() {
        let res = resource(PermissionDeclaration::open().with_read("R"));
        let oracle = StaticPolicyOracle::builder()
            .hold(CALLER, "R")
            .map_op("R", OpCode::new(4))
            .set_mode(OpCode::new(4), PolicyMode::Default)
            .build();
        let (engine, _) = build_engine(oracle);

        assert!(engine.check_read(&loc("content://notes/x"), &caller(), &res).is_ignored());
    }

    #[test]
    fn overlay_op_replaces_permission_op_mode() {
        let res = resource(PermissionDeclaration::open().with_read("R"))
            .with_overlay_ops(OpCode::new(9), OpCode::NONE);
        let oracle = StaticPolicyOracle::builder()
            .hold(CALLER, "R")
            .map_op("R", OpCode::new(4))
            .set_mode(OpCode::new(4), PolicyMode::Errored)
            .set_mode(OpCode::new(9), PolicyMode::Allowed)
            .build();
        let (engine, _) = build_engine(oracle);

        assert!(engine.check_read(&loc("content://notes/x"), &caller(), &res).is_allowed());

        let mode =
            engine.check_permission_and_app_op(&Permission::new("R"), &caller(), OpCode::NONE);
        assert_eq!(mode, AccessMode::Errored);
    }

    #[test]
    fn not_exported_only_grants_help() {
        let res = resource(PermissionDeclaration::open()).exported(false);
        let (engine, grants) = build_engine(StaticPolicyOracle::builder().build());
        let target = loc("content://notes/items/1");

        let decision = engine.check_read(&target, &caller(), &res);
        assert!(matches!(
            &decision,
            AccessDecision::Errored { hint, missing_permission: None }
                if hint == "requires the resource be exported, or an explicit grant"
        ));

        grants
            .grant(LocatorGrant::persistent(target.clone(), CALLER, GrantMode::READ))
            .expect("grant");
        assert!(engine.check_read(&target, &caller(), &res).is_allowed());
        assert!(engine.check_write(&target, &caller(), &res).is_errored());
    }

    #[test]
    fn foreign_tenant_needs_cross_tenant_permission() {
        let res = resource(PermissionDeclaration::open());
        let foreign_uid = Uid::of(TenantId::new(10), 10_050).expect("uid in range");
        let foreign = CallIdentity::new(foreign_uid, Pid::new(7));

        let (engine, _) = build_engine(StaticPolicyOracle::builder().build());
        assert!(engine.check_read(&loc("content://notes/x"), &foreign, &res).is_errored());

        let (engine, _) = engine_with_cross_tenant(foreign.uid, &res);
        assert!(engine.check_read(&loc("content://notes/x"), &foreign, &res).is_allowed());
    }

    fn engine_with_cross_tenant(
        uid: Uid,
        res: &ResourceDescriptor) -> (AuthorizationEngine, Arc<DefaultGrantTable>,
    ) {
        build_engine(
            StaticPolicyOracle::builder()
                .hold(uid, res.cross_tenant_permission.as_str())
                .build(),
        )
    }

    #[test]
    fn single_tenant_grant_rescoped_with_caller_tenant() {
        let res = resource(PermissionDeclaration::open().with_read("R")).single_tenant(true);
        let (engine, grants) = build_engine(StaticPolicyOracle::builder().build());
        let foreign_uid = Uid::of(TenantId::new(10), 10_050).expect("uid in range");
        let foreign = CallIdentity::new(foreign_uid, Pid::new(7));
        let target = loc("content://notes/items/1");

        grants
            .grant(LocatorGrant::persistent(
                loc("content://10@notes/items/1"),
                foreign.uid,
                GrantMode::READ,
            ))
            .expect("grant");
        assert!(engine.check_read(&target, &foreign, &res).is_allowed());
    }
}
