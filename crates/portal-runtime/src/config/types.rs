//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use super::ConfigError;
use crate::auth::StaticPolicyOracle;
use crate::resource::{AuthoritySet, ResourceDescriptor};
use portal_auth::{
    GrantMode, LocatorGrant, OpCode, PathPattern, PathRule, Permission, PermissionDeclaration,
    PolicyMode,
};
use portal_types::{Locator, PackageName, TenantId, TryNew, Uid};
use serde::{Deserialize, Serialize};

/// Main configuration structure.
///
/// This is the unified configuration after merging all layers.
///
/// # Example
///
/// ```
/// use portal_runtime::config::PortalConfig;
///
/// let config = PortalConfig::from_toml(
///     r#"
/// [resource]
/// authorities = ["com.example.notes"]
/// owner_uid = 10001
/// read_permission = "notes.READ"
///
/// [[resource.path_rules]]
/// path = "/private/*"
/// kind = "glob"
/// read_permission = "notes.PRIVATE"
/// "#,
/// )
/// .unwrap();
///
/// let resource = config.resource_descriptor().unwrap();
/// assert!(resource.authorities.contains("com.example.notes"));
/// assert_eq!(resource.declaration.path_rules.len(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PortalConfig {
    /// The fronted resource.
    pub resource: ResourceConfig,

    /// Static policy answers for offline checks.
    pub simulation: SimulationConfig,
}

impl PortalConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges `other` over `self`. Only values that differ from the
    /// defaults override; simulation lists accumulate.
    pub fn merge(&mut self, other: &Self) {
        self.resource.merge(&other.resource);
        self.simulation.merge(&other.simulation);
    }

    /// Builds the runtime descriptor of the configured resource.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an invalid path pattern or package name.
    pub fn resource_descriptor(&self) -> Result<ResourceDescriptor, ConfigError> {
        ResourceDescriptor::try_from(&self.resource)
    }
}

/// Kind of a configured path pattern.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Exact path.
    Literal,
    /// Path prefix.
    #[default]
    Prefix,
    /// Simple glob (`*`, `?`, `[..]`).
    Glob,
}

/// One `[[resource.path_rules]]` entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathRuleConfig {
    /// Pattern text.
    pub path: String,
    /// How `path` is matched.
    pub kind: PatternKind,
    /// Permission required to read matching paths.
    pub read_permission: Option<String>,
    /// Permission required to write matching paths.
    pub write_permission: Option<String>,
}

impl TryFrom<&PathRuleConfig> for PathRule {
    type Error = ConfigError;

    fn try_from(config: &PathRuleConfig) -> Result<Self, Self::Error> {
        let pattern = match config.kind {
            PatternKind::Literal => PathPattern::literal(config.path.clone()),
            PatternKind::Prefix => PathPattern::prefix(config.path.clone()),
            PatternKind::Glob => PathPattern::glob(&config.path)
                .map_err(|e| ConfigError::invalid_pattern(&config.path, e.to_string()))?,
        };

        let mut rule = PathRule::new(pattern);
        if let Some(p) = &config.read_permission {
            rule = rule.read(p.as_str());
        }
        if let Some(p) = &config.write_permission {
            rule = rule.write(p.as_str());
        }
        Ok(rule)
    }
}

/// `[resource]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResourceConfig {
    /// Authority names the resource answers to.
    pub authorities: Vec<String>,

    /// Reachable from other applications.
    pub exported: bool,

    /// One instance serves every tenant.
    pub single_tenant: bool,

    /// Uid of the owning application.
    pub owner_uid: u32,

    /// Package of the owning application.
    pub owner_package: Option<String>,

    /// Tenant the resource runs in. Derived from `owner_uid` when unset.
    pub tenant: Option<u32>,

    /// Additional tenants whose locators are accepted.
    pub redirect_tenants: Vec<u32>,

    /// Component-wide read permission.
    pub read_permission: Option<String>,

    /// Component-wide write permission.
    pub write_permission: Option<String>,

    /// Overlay op applied to read checks.
    pub read_op: Option<i32>,

    /// Overlay op applied to write checks.
    pub write_op: Option<i32>,

    /// Overrides the permission admitting callers from other tenants.
    pub cross_tenant_permission: Option<String>,

    /// Channel to the store survives endpoint loss.
    pub stable_channel: bool,

    /// Per-path permission rules, in match order.
    pub path_rules: Vec<PathRuleConfig>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            authorities: Vec::new(),
            exported: true,
            single_tenant: false,
            owner_uid: 10_000,
            owner_package: None,
            tenant: None,
            redirect_tenants: Vec::new(),
            read_permission: None,
            write_permission: None,
            read_op: None,
            write_op: None,
            cross_tenant_permission: None,
            stable_channel: true,
            path_rules: Vec::new(),
        }
    }
}

impl ResourceConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.authorities != default.authorities {
            self.authorities = other.authorities.clone();
        }
        if other.exported != default.exported {
            self.exported = other.exported;
        }
        if other.single_tenant != default.single_tenant {
            self.single_tenant = other.single_tenant;
        }
        if other.owner_uid != default.owner_uid {
            self.owner_uid = other.owner_uid;
        }
        if other.owner_package.is_some() {
            self.owner_package = other.owner_package.clone();
        }
        if other.tenant.is_some() {
            self.tenant = other.tenant;
        }
        if !other.redirect_tenants.is_empty() {
            self.redirect_tenants = other.redirect_tenants.clone();
        }
        if other.read_permission.is_some() {
            self.read_permission = other.read_permission.clone();
        }
        if other.write_permission.is_some() {
            self.write_permission = other.write_permission.clone();
        }
        if other.read_op.is_some() {
            self.read_op = other.read_op;
        }
        if other.write_op.is_some() {
            self.write_op = other.write_op;
        }
        if other.cross_tenant_permission.is_some() {
            self.cross_tenant_permission = other.cross_tenant_permission.clone();
        }
        if other.stable_channel != default.stable_channel {
            self.stable_channel = other.stable_channel;
        }
        if !other.path_rules.is_empty() {
            self.path_rules = other.path_rules.clone();
        }
    }
}

impl TryFrom<&ResourceConfig> for ResourceDescriptor {
    type Error = ConfigError;

    fn try_from(config: &ResourceConfig) -> Result<Self, Self::Error> {
        let mut declaration = PermissionDeclaration::open();
        if let Some(p) = &config.read_permission {
            declaration = declaration.with_read(p.as_str());
        }
        if let Some(p) = &config.write_permission {
            declaration = declaration.with_write(p.as_str());
        }
        for rule in &config.path_rules {
            declaration = declaration.with_rule(PathRule::try_from(rule)?);
        }

        let mut resource = ResourceDescriptor::new(
            config.authorities.iter().cloned().collect::<AuthoritySet>(),
            Uid::new(config.owner_uid),
        )
        .with_declaration(declaration)
        .exported(config.exported)
        .single_tenant(config.single_tenant)
        .with_overlay_ops(
            config.read_op.map_or(OpCode::NONE, OpCode::new),
            config.write_op.map_or(OpCode::NONE, OpCode::new),
        )
        .stable_channel(config.stable_channel);

        if let Some(name) = &config.owner_package {
            resource = resource.with_owner_package(parse_package(name)?);
        }
        if let Some(tenant) = config.tenant {
            resource.tenant = TenantId::new(tenant);
        }
        resource.redirect_tenants = config
            .redirect_tenants
            .iter()
            .copied()
            .map(TenantId::new)
            .collect();
        if let Some(p) = &config.cross_tenant_permission {
            resource.cross_tenant_permission = Permission::new(p.as_str());
        }

        Ok(resource)
    }
}

/// A uid holding a permission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeldPermission {
    /// Holder.
    pub uid: u32,
    /// Permission name.
    pub permission: String,
}

/// A permission gated by an op.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpMapping {
    /// Permission name.
    pub permission: String,
    /// Gating op.
    pub op: i32,
}

/// Mode of an op, for every uid or one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpModeConfig {
    /// Op code.
    pub op: i32,
    /// Restricts the mode to one uid.
    pub uid: Option<u32>,
    /// Reported mode.
    pub mode: PolicyMode,
}

/// An explicit grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrantConfig {
    /// Exact locator granted.
    pub locator: String,
    /// Grantee.
    pub uid: u32,
    /// Grants read access.
    #[serde(default)]
    pub read: bool,
    /// Grants write access.
    #[serde(default)]
    pub write: bool,
    /// Consumed on first use.
    #[serde(default)]
    pub one_time: bool,
}

/// A package installed under a uid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageOwner {
    /// Package name.
    pub package: String,
    /// Owning uid.
    pub uid: u32,
}

/// `[simulation]` section: the static world the CLI checks against.
///
/// ```toml
/// [[simulation.held]]
/// uid = 10050
/// permission = "notes.READ"
///
/// [[simulation.modes]]
/// op = 4
/// mode = "ignored"
///
/// [[simulation.grants]]
/// locator = "content://com.example.notes/items/7"
/// uid = 10050
/// read = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Held permissions.
    pub held: Vec<HeldPermission>,
    /// Permission to op mappings.
    pub ops: Vec<OpMapping>,
    /// Op modes.
    pub modes: Vec<OpModeConfig>,
    /// Explicit grants.
    pub grants: Vec<GrantConfig>,
    /// Package ownership.
    pub packages: Vec<PackageOwner>,
}

impl SimulationConfig {
    fn merge(&mut self, other: &Self) {
        // Accumulate across layers
        self.held.extend(other.held.iter().cloned());
        self.ops.extend(other.ops.iter().cloned());
        self.modes.extend(other.modes.iter().cloned());
        self.grants.extend(other.grants.iter().cloned());
        self.packages.extend(other.packages.iter().cloned());
    }

    /// Builds the static oracle described by this section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an invalid package name.
    pub fn oracle(&self) -> Result<StaticPolicyOracle, ConfigError> {
        let mut builder = StaticPolicyOracle::builder();
        for held in &self.held {
            builder = builder.hold(Uid::new(held.uid), held.permission.as_str());
        }
        for mapping in &self.ops {
            builder = builder.map_op(mapping.permission.as_str(), OpCode::new(mapping.op));
        }
        for mode in &self.modes {
            builder = match mode.uid {
                Some(uid) => builder.set_mode_for(OpCode::new(mode.op), Uid::new(uid), mode.mode),
                None => builder.set_mode(OpCode::new(mode.op), mode.mode),
            };
        }
        for owner in &self.packages {
            builder = builder.own_package(parse_package(&owner.package)?, Uid::new(owner.uid));
        }
        Ok(builder.build())
    }

    /// The configured grants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an unparsable locator.
    pub fn grant_list(&self) -> Result<Vec<LocatorGrant>, ConfigError> {
        self.grants
            .iter()
            .map(|g| {
                let locator: Locator = g
                    .locator
                    .parse()
                    .map_err(|e: portal_types::LocatorError| {
                        ConfigError::invalid_value("grant locator", &g.locator, e.to_string())
                    })?;
                let mut mode = GrantMode::empty();
                mode.set(GrantMode::READ, g.read);
                mode.set(GrantMode::WRITE, g.write);
                Ok(if g.one_time {
                    LocatorGrant::one_time(locator, Uid::new(g.uid), mode)
                } else {
                    LocatorGrant::persistent(locator, Uid::new(g.uid), mode)
                })
            })
            .collect()
    }
}

fn parse_package(name: &str) -> Result<PackageName, ConfigError> {
    PackageName::try_new(name.to_string())
        .map_err(|e| ConfigError::invalid_value("package", name, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_auth::{AccessKind, PolicyOracle};
    use portal_types::Pid;

    #[test]
    fn default_resource_is_exported_and_stable() {
        let config = PortalConfig::default();
        assert!(config.resource.exported);
        assert!(config.resource.stable_channel);
        assert!(!config.resource.single_tenant);
    }

    #[test]
    fn merge_overrides_non_default() {
        let mut base = PortalConfig::default();
        base.resource.authorities = vec!["a".into()];
        let overlay = PortalConfig {
            resource: ResourceConfig {
                exported: false,
                read_permission: Some("R".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        base.merge(&overlay);

        assert!(!base.resource.exported);
        assert_eq!(base.resource.read_permission.as_deref(), Some("R"));
        assert_eq!(base.resource.authorities, vec!["a".to_string()]);
    }

    #[test]
    fn merge_keeps_base_when_overlay_is_default() {
        let mut base = PortalConfig::default();
        base.resource.single_tenant = true;
        base.merge(&PortalConfig::default());
        assert!(base.resource.single_tenant);
    }

    #[test]
    fn simulation_lists_accumulate() {
        let mut base = PortalConfig::default();
        base.simulation.held.push(HeldPermission {
            uid: 1,
            permission: "a".into(),
        });
        let mut overlay = PortalConfig::default();
        overlay.simulation.held.push(HeldPermission {
            uid: 2,
            permission: "b".into(),
        });

        base.merge(&overlay);
        assert_eq!(base.simulation.held.len(), 2);
    }

    #[test]
    fn descriptor_from_config() {
        let config = PortalConfig::from_toml(
            r#"
[resource]
authorities = ["com.example.notes", "com.example.notes.v2"]
owner_uid = 1010001
owner_package = "com.example.notes"
single_tenant = true
redirect_tenants = [11]
write_permission = "notes.WRITE"
write_op = 12

[[resource.path_rules]]
path = "/archive"
kind = "literal"
write_permission = "notes.ARCHIVE"
"#,
        )
        .expect("valid toml");

        let resource = config.resource_descriptor().expect("valid resource");
        assert!(resource.authorities.contains("com.example.notes.v2"));
        assert!(resource.single_tenant);
        assert_eq!(resource.tenant, TenantId::new(10));
        assert_eq!(resource.redirect_tenants, vec![TenantId::new(11)]);
        assert_eq!(resource.overlay_op(AccessKind::Write), OpCode::new(12));
        assert_eq!(resource.overlay_op(AccessKind::Read), OpCode::NONE);
        assert_eq!(
            resource.declaration.component_permission(AccessKind::Write),
            Some(&Permission::new("notes.WRITE"))
        );
        assert!(resource.owner_package.is_some());
    }

    #[test]
    fn invalid_glob_is_rejected() {
        let config = PortalConfig::from_toml(
            r#"
[[resource.path_rules]]
path = "/a/[b"
kind = "glob"
"#,
        )
        .expect("valid toml");

        let err = config.resource_descriptor().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn simulation_builds_oracle_and_grants() {
        let config = PortalConfig::from_toml(
            r#"
[[simulation.held]]
uid = 10050
permission = "notes.READ"

[[simulation.ops]]
permission = "notes.READ"
op = 4

[[simulation.modes]]
op = 4
mode = "ignored"

[[simulation.modes]]
op = 4
uid = 10051
mode = "errored"

[[simulation.grants]]
locator = "content://com.example.notes/items/7"
uid = 10050
read = true
one_time = true
"#,
        )
        .expect("valid toml");

        let oracle = config.simulation.oracle().expect("valid simulation");
        let read = Permission::new("notes.READ");
        assert!(oracle.permission_held(&read, Pid::new(1), Uid::new(10_050)));
        assert_eq!(oracle.op_for_permission(&read), OpCode::new(4));
        assert_eq!(oracle.policy_mode(OpCode::new(4), Uid::new(10_050), None), PolicyMode::Ignored);
        assert_eq!(oracle.policy_mode(OpCode::new(4), Uid::new(10_051), None), PolicyMode::Errored);

        let grants = config.simulation.grant_list().expect("valid grants");
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].mode, GrantMode::READ);
        assert_eq!(grants[0].kind, portal_auth::GrantKind::OneTime);
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = PortalConfig::default();
        config.resource.authorities = vec!["com.example.notes".into()];
        config.resource.path_rules.push(PathRuleConfig {
            path: "/private/*".into(),
            kind: PatternKind::Glob,
            read_permission: Some("P".into()),
            write_permission: None,
        });

        let text = config.to_toml().expect("serialize");
        let parsed = PortalConfig::from_toml(&text).expect("parse");
        assert_eq!(parsed, config);
    }
}
