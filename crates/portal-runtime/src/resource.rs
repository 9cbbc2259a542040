//! Immutable description of the resource a gateway fronts.
//!
//! A [`ResourceDescriptor`] is built once (from code or from
//! [`PortalConfig`](crate::config::PortalConfig)) and then shared read-only
//! by every call.

use portal_auth::{AccessKind, OpCode, Permission, PermissionDeclaration};
use portal_types::{CallIdentity, PackageName, Pid, TenantId, Uid};

/// Default permission that lets a caller reach a resource of another
/// tenant.
pub const CROSS_TENANT_PERMISSION: &str = "portal.permission.INTERACT_ACROSS_TENANTS";

/// The authority names a resource answers to.
///
/// Declared as one name or a `;`-separated list.
///
/// # Example
///
/// ```
/// use portal_runtime::AuthoritySet;
///
/// let set = AuthoritySet::parse("com.example.notes;com.example.notes.legacy");
/// assert!(set.contains("com.example.notes.legacy"));
/// assert!(!set.contains("com.example"));
/// assert_eq!(set.primary(), Some("com.example.notes"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthoritySet(Vec<String>);

impl AuthoritySet {
    /// A set with exactly one authority.
    #[must_use]
    pub fn single(authority: impl Into<String>) -> Self {
        Self(vec![authority.into()])
    }

    /// Parses a `;`-separated list. Empty entries and duplicates are
    /// dropped, declaration order is kept.
    #[must_use]
    pub fn parse(declared: &str) -> Self {
        declared
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Returns `true` if `authority` is one of the declared names.
    #[must_use]
    pub fn contains(&self, authority: &str) -> bool {
        self.0.iter().any(|a| a == authority)
    }

    /// First declared authority.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Declared authorities in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns `true` if nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for AuthoritySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut names: Vec<String> = Vec::new();
        for name in iter {
            let name = name.into();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Self(names)
    }
}

impl std::fmt::Display for AuthoritySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(";"))
    }
}

/// Everything the gateway knows about the resource it fronts.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    /// Authority names the resource answers to.
    pub authorities: AuthoritySet,
    /// Declared permissions.
    pub declaration: PermissionDeclaration,
    /// Whether callers outside the owning application may reach it.
    pub exported: bool,
    /// One instance serves every tenant; tenant prefixes are kept.
    pub single_tenant: bool,
    /// Uid of the owning application.
    pub owner_uid: Uid,
    /// Package of the owning application.
    pub owner_package: Option<PackageName>,
    /// Tenant this instance runs in.
    pub tenant: TenantId,
    /// Tenants whose locators are accepted even though they differ from
    /// [`tenant`](Self::tenant).
    pub redirect_tenants: Vec<TenantId>,
    /// Policy overlay op applied to read checks.
    pub read_op: OpCode,
    /// Policy overlay op applied to write checks.
    pub write_op: OpCode,
    /// Permission that admits callers from another tenant.
    pub cross_tenant_permission: Permission,
    /// Whether the channel to the store is stable. Endpoint loss on an
    /// unstable channel is reported to the connection manager.
    pub stable_channel: bool,
}

impl ResourceDescriptor {
    /// Creates an exported, multi-tenant resource owned by `owner_uid`
    /// with no declared permissions.
    #[must_use]
    pub fn new(authorities: AuthoritySet, owner_uid: Uid) -> Self {
        Self {
            authorities,
            declaration: PermissionDeclaration::open(),
            exported: true,
            single_tenant: false,
            owner_uid,
            owner_package: None,
            tenant: owner_uid.tenant(),
            redirect_tenants: Vec::new(),
            read_op: OpCode::NONE,
            write_op: OpCode::NONE,
            cross_tenant_permission: Permission::new(CROSS_TENANT_PERMISSION),
            stable_channel: true,
        }
    }

    /// Replaces the permission declaration.
    #[must_use]
    pub fn with_declaration(mut self, declaration: PermissionDeclaration) -> Self {
        self.declaration = declaration;
        self
    }

    /// Sets the exported flag.
    #[must_use]
    pub fn exported(mut self, exported: bool) -> Self {
        self.exported = exported;
        self
    }

    /// Sets the single-tenant flag.
    #[must_use]
    pub fn single_tenant(mut self, single_tenant: bool) -> Self {
        self.single_tenant = single_tenant;
        self
    }

    /// Sets the owning package.
    #[must_use]
    pub fn with_owner_package(mut self, package: PackageName) -> Self {
        self.owner_package = Some(package);
        self
    }

    /// Sets the overlay ops.
    #[must_use]
    pub fn with_overlay_ops(mut self, read_op: OpCode, write_op: OpCode) -> Self {
        self.read_op = read_op;
        self.write_op = write_op;
        self
    }

    /// Sets the channel stability.
    #[must_use]
    pub fn stable_channel(mut self, stable: bool) -> Self {
        self.stable_channel = stable;
        self
    }

    /// Overlay op for `kind`.
    #[must_use]
    pub fn overlay_op(&self, kind: AccessKind) -> OpCode {
        match kind {
            AccessKind::Read => self.read_op,
            AccessKind::Write => self.write_op,
        }
    }

    /// Returns `true` if locators scoped to `tenant` may reach this
    /// instance.
    #[must_use]
    pub fn accepts_tenant(&self, tenant: TenantId) -> bool {
        self.single_tenant
            || tenant.is_current()
            || tenant == self.tenant
            || self.redirect_tenants.contains(&tenant)
    }

    /// Identity the gateway itself acts under.
    #[must_use]
    pub fn owner_identity(&self) -> CallIdentity {
        let identity = CallIdentity::new(self.owner_uid, Pid::new(std::process::id()));
        match &self.owner_package {
            Some(package) => identity.with_package(package.clone()),
            None => identity,
        }
    }
}
