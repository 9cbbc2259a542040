//! Caller identity types.
//!
//! A [`CallIdentity`] is what the transport asserts about the process on
//! the other side of a call: its uid, its pid, and (optionally) the
//! package it claims to speak for. Only the uid and pid are vouched for
//! by the transport; the package is a claim that must be re-verified
//! against the uid before it is trusted.
//!
//! # Uid Layout
//!
//! ```text
//! uid = tenant * 100_000 + app_id
//!
//!   1_010_123  →  tenant 10, app 10123
//!      10_123  →  tenant 0,  app 10123   (same application as above)
//! ```

use crate::TryNew;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Tenant (multi-user) scoping id.
///
/// [`TenantId::CURRENT`] is a sentinel meaning "the tenant of whoever is
/// asking"; it is never encoded into a locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(u32);

impl TenantId {
    /// The caller's own tenant. Never written into an address.
    pub const CURRENT: Self = Self(u32::MAX);

    /// The system (primary) tenant.
    pub const SYSTEM: Self = Self(0);

    /// Creates a tenant id.
    ///
    /// `u32::MAX` is reserved for [`TenantId::CURRENT`].
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns `true` for the [`TenantId::CURRENT`] sentinel.
    #[must_use]
    pub const fn is_current(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_current() {
            f.write_str("current")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Transport-vouched user id of a calling process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uid(u32);

impl Uid {
    /// Number of uids reserved per tenant.
    pub const PER_TENANT_RANGE: u32 = 100_000;

    /// Creates a uid from its raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Composes a uid from a tenant and an application id.
    ///
    /// Returns `None` when the tenant has no uid range, which includes
    /// [`TenantId::CURRENT`].
    #[must_use]
    pub const fn of(tenant: TenantId, app_id: u32) -> Option<Self> {
        if tenant.is_current() {
            return None;
        }
        match tenant.get().checked_mul(Self::PER_TENANT_RANGE) {
            Some(base) => match base.checked_add(app_id % Self::PER_TENANT_RANGE) {
                Some(raw) => Some(Self(raw)),
                None => None,
            },
            None => None,
        }
    }

    /// Returns the raw uid.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the tenant this uid runs as.
    #[must_use]
    pub const fn tenant(self) -> TenantId {
        TenantId(self.0 / Self::PER_TENANT_RANGE)
    }

    /// Returns the tenant-independent application id.
    #[must_use]
    pub const fn app_id(self) -> u32 {
        self.0 % Self::PER_TENANT_RANGE
    }

    /// Returns `true` if both uids belong to the same application,
    /// regardless of tenant.
    #[must_use]
    pub const fn is_same_app(self, other: Self) -> bool {
        self.app_id() == other.app_id()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-vouched process id of a calling process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pid(u32);

impl Pid {
    /// Creates a pid.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw pid.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a package name fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackageNameError {
    /// The name was empty.
    #[error("package name must not be empty")]
    Empty,

    /// The name contained a character outside `[A-Za-z0-9._-]`.
    #[error("invalid character {ch:?} in package name '{name}'")]
    InvalidChar { name: String, ch: char },
}

/// Name of an application package, e.g. `com.example.notes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageName(String);

impl PackageName {
    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryNew for PackageName {
    type Error = PackageNameError;
    type Args = String;

    fn try_new(name: String) -> Result<Self, Self::Error> {
        if name.is_empty() {
            return Err(PackageNameError::Empty);
        }
        if let Some(ch) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(PackageNameError::InvalidChar { name, ch });
        }
        Ok(Self(name))
    }
}

impl TryFrom<String> for PackageName {
    type Error = PackageNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl TryFrom<&str> for PackageName {
    type Error = PackageNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_new(value.to_string())
    }
}

impl From<PackageName> for String {
    fn from(value: PackageName) -> Self {
        value.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity asserted for one inbound call.
///
/// # Why No Default?
///
/// There is no sensible anonymous caller; every call arrives with a
/// transport-vouched uid and pid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallIdentity {
    /// Package the caller claims to act for. Unverified until read
    /// through a call context.
    pub package: Option<PackageName>,
    /// Calling uid.
    pub uid: Uid,
    /// Calling pid.
    pub pid: Pid,
}

impl CallIdentity {
    /// Creates an identity with no asserted package.
    #[must_use]
    pub fn new(uid: Uid, pid: Pid) -> Self {
        Self {
            package: None,
            uid,
            pid,
        }
    }

    /// Returns a copy asserting `package`.
    #[must_use]
    pub fn with_package(mut self, package: PackageName) -> Self {
        self.package = Some(package);
        self
    }

    /// Returns the tenant the caller runs as.
    #[must_use]
    pub fn tenant(&self) -> TenantId {
        self.uid.tenant()
    }
}

impl fmt::Display for CallIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.package {
            Some(pkg) => write!(f, "{pkg}(uid={}, pid={})", self.uid, self.pid),
            None => write!(f, "uid={}, pid={}", self.uid, self.pid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_splits_into_tenant_and_app() {
        let uid = Uid::new(1_010_123);
        assert_eq!(uid.tenant(), TenantId::new(10));
        assert_eq!(uid.app_id(), 10_123);
        assert_eq!(Uid::of(TenantId::new(10), 10_123), Some(uid));
    }

    #[test]
    fn uid_of_rejects_tenants_without_a_range() {
        assert_eq!(Uid::of(TenantId::CURRENT, 10_123), None);
        assert_eq!(Uid::of(TenantId::new(42_950), 0), None);

        let last = Uid::of(TenantId::new(42_949), 10_123).expect("last full tenant fits");
        assert_eq!(last.tenant(), TenantId::new(42_949));
        assert_eq!(last.app_id(), 10_123);
    }

    #[test]
    fn same_app_across_tenants() {
        let primary = Uid::new(10_123);
        let secondary = Uid::new(1_010_123);
        assert!(primary.is_same_app(secondary));
        assert!(!primary.is_same_app(Uid::new(10_124)));
    }

    #[test]
    fn current_tenant_sentinel() {
        assert!(TenantId::CURRENT.is_current());
        assert!(!TenantId::SYSTEM.is_current());
        assert_eq!(TenantId::CURRENT.to_string(), "current");
        assert_eq!(TenantId::new(7).to_string(), "7");
    }

    #[test]
    fn package_name_validation() {
        assert!(PackageName::try_new("com.example.notes".into()).is_ok());
        assert_eq!(
            PackageName::try_new(String::new()).unwrap_err(),
            PackageNameError::Empty
        );
        let err = PackageName::try_new("com example".into()).unwrap_err();
        assert!(matches!(err, PackageNameError::InvalidChar { ch: ' ', .. }));
    }

    #[test]
    fn package_name_serde_rejects_invalid() {
        let ok: PackageName = serde_json::from_str("\"com.example\"").expect("valid name");
        assert_eq!(ok.as_str(), "com.example");
        assert!(serde_json::from_str::<PackageName>("\"bad/name\"").is_err());
    }

    #[test]
    fn call_identity_display() {
        let caller = CallIdentity::new(Uid::new(10_050), Pid::new(77));
        assert_eq!(caller.to_string(), "uid=10050, pid=77");

        let pkg = PackageName::try_from("com.example").expect("valid name");
        let caller = caller.with_package(pkg);
        assert_eq!(caller.to_string(), "com.example(uid=10050, pid=77)");
        assert_eq!(caller.tenant(), TenantId::SYSTEM);
    }
}
