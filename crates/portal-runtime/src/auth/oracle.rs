//! Table-driven [`PolicyOracle`] and [`PackageVerifier`].
//!
//! Answers every question from fixed tables built up front. Used by the
//! CLI simulation and by tests; a platform integration would implement
//! the traits against its own services.

use portal_auth::{OpCode, PackageVerifier, Permission, PolicyMode, PolicyOracle};
use portal_types::{PackageName, Pid, Uid};
use std::collections::{HashMap, HashSet};

/// Static answers for permission, op and package questions.
///
/// Anything not configured is denied, except op modes: an op with no
/// configured mode reports [`PolicyMode::Allowed`].
///
/// # Example
///
/// ```
/// use portal_auth::{OpCode, Permission, PolicyMode, PolicyOracle};
/// use portal_runtime::auth::StaticPolicyOracle;
/// use portal_types::{Pid, Uid};
///
/// let caller = Uid::new(10_050);
/// let oracle = StaticPolicyOracle::builder()
///     .hold(caller, "notes.READ")
///     .map_op("notes.READ", OpCode::new(4))
///     .set_mode(OpCode::new(4), PolicyMode::Ignored)
///     .build();
///
/// let read = Permission::new("notes.READ");
/// assert!(oracle.permission_held(&read, Pid::new(7), caller));
/// assert_eq!(oracle.op_for_permission(&read), OpCode::new(4));
/// assert_eq!(oracle.policy_mode(OpCode::new(4), caller, None), PolicyMode::Ignored);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyOracle {
    held: HashSet<(Uid, Permission)>,
    ops: HashMap<Permission, OpCode>,
    modes: HashMap<OpCode, PolicyMode>,
    uid_modes: HashMap<(OpCode, Uid), PolicyMode>,
    packages: HashSet<(PackageName, Uid)>,
}

impl StaticPolicyOracle {
    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> StaticPolicyOracleBuilder {
        StaticPolicyOracleBuilder::default()
    }

    /// Number of held (uid, permission) pairs.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}

impl PolicyOracle for StaticPolicyOracle {
    fn permission_held(&self, permission: &Permission, _pid: Pid, uid: Uid) -> bool {
        self.held.contains(&(uid, permission.clone()))
    }

    fn op_for_permission(&self, permission: &Permission) -> OpCode {
        self.ops.get(permission).copied().unwrap_or(OpCode::NONE)
    }

    fn policy_mode(&self, op: OpCode, uid: Uid, _package: Option<&PackageName>) -> PolicyMode {
        self.uid_modes
            .get(&(op, uid))
            .or_else(|| self.modes.get(&op))
            .copied()
            .unwrap_or(PolicyMode::Allowed)
    }
}

impl PackageVerifier for StaticPolicyOracle {
    fn package_belongs_to(&self, package: &PackageName, uid: Uid) -> bool {
        self.packages.contains(&(package.clone(), uid))
    }
}

/// Builder for [`StaticPolicyOracle`].
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyOracleBuilder {
    inner: StaticPolicyOracle,
}

impl StaticPolicyOracleBuilder {
    /// `uid` holds `permission`.
    #[must_use]
    pub fn hold(mut self, uid: Uid, permission: impl Into<Permission>) -> Self {
        self.inner.held.insert((uid, permission.into()));
        self
    }

    /// `permission` is gated by `op`.
    #[must_use]
    pub fn map_op(mut self, permission: impl Into<Permission>, op: OpCode) -> Self {
        self.inner.ops.insert(permission.into(), op);
        self
    }

    /// Mode of `op` for every uid without a per-uid override.
    #[must_use]
    pub fn set_mode(mut self, op: OpCode, mode: PolicyMode) -> Self {
        self.inner.modes.insert(op, mode);
        self
    }

    /// Mode of `op` for `uid` only.
    #[must_use]
    pub fn set_mode_for(mut self, op: OpCode, uid: Uid, mode: PolicyMode) -> Self {
        self.inner.uid_modes.insert((op, uid), mode);
        self
    }

    /// `package` is installed under `uid`.
    #[must_use]
    pub fn own_package(mut self, package: PackageName, uid: Uid) -> Self {
        self.inner.packages.insert((package, uid));
        self
    }

    /// Finishes the oracle.
    #[must_use]
    pub fn build(self) -> StaticPolicyOracle {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_types::TryNew;

    const A: Uid = Uid::new(10_050);
    const B: Uid = Uid::new(10_051);

    #[test]
    fn empty_oracle_denies_permissions_and_allows_ops() {
        let oracle = StaticPolicyOracle::builder().build();
        assert!(!oracle.permission_held(&Permission::new("x"), Pid::new(1), A));
        assert_eq!(oracle.op_for_permission(&Permission::new("x")), OpCode::NONE);
        assert_eq!(oracle.policy_mode(OpCode::new(3), A, None), PolicyMode::Allowed);
    }

    #[test]
    fn per_uid_mode_overrides_global() {
        let oracle = StaticPolicyOracle::builder()
            .set_mode(OpCode::new(3), PolicyMode::Ignored)
            .set_mode_for(OpCode::new(3), B, PolicyMode::Errored)
            .build();
        assert_eq!(oracle.policy_mode(OpCode::new(3), A, None), PolicyMode::Ignored);
        assert_eq!(oracle.policy_mode(OpCode::new(3), B, None), PolicyMode::Errored);
    }

    #[test]
    fn permissions_are_per_uid() {
        let oracle = StaticPolicyOracle::builder().hold(A, "p").build();
        assert!(oracle.permission_held(&Permission::new("p"), Pid::new(1), A));
        assert!(!oracle.permission_held(&Permission::new("p"), Pid::new(1), B));
        assert_eq!(oracle.held_count(), 1);
    }

    #[test]
    fn package_ownership() {
        let pkg = PackageName::try_new("com.example.client".to_string()).expect("valid package");
        let oracle = StaticPolicyOracle::builder().own_package(pkg.clone(), A).build();
        assert!(oracle.package_belongs_to(&pkg, A));
        assert!(!oracle.package_belongs_to(&pkg, B));
    }
}
