//! Interfaces to the platform's permission and app-policy services.
//!
//! The gateway never decides on its own whether a process holds a
//! permission; it asks a [`PolicyOracle`]. Likewise, whether a claimed
//! package really belongs to a uid is answered by a [`PackageVerifier`].
//!
//! Both are `Send + Sync` so a single instance can be shared by every
//! gateway call.

use crate::Permission;
use portal_types::{PackageName, Pid, Uid};
use serde::{Deserialize, Serialize};
use std::fmt;

/// App-policy operation code.
///
/// Permissions map to op codes through
/// [`PolicyOracle::op_for_permission`]; resources may also configure an
/// independent overlay op per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpCode(i32);

impl OpCode {
    /// No op code: the permission (or overlay) has no app-policy gate.
    pub const NONE: Self = Self(-1);

    /// Creates an op code.
    #[must_use]
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// Raw value.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Returns `true` for [`OpCode::NONE`].
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }
}

impl Default for OpCode {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("none")
        } else {
            write!(f, "op:{}", self.0)
        }
    }
}

/// Mode of an op code for a package, as reported by the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Operation permitted.
    Allowed,
    /// Operation silently suppressed.
    Ignored,
    /// Operation refused.
    Errored,
    /// No explicit mode; the gateway treats it as [`PolicyMode::Ignored`].
    Default,
}

/// Answers permission and app-policy questions for a caller.
///
/// # Example
///
/// ```
/// use portal_auth::{OpCode, Permission, PolicyMode, PolicyOracle};
/// use portal_types::{PackageName, Pid, Uid};
///
/// #[derive(Debug)]
/// struct AllowAll;
///
/// impl PolicyOracle for AllowAll {
///     fn permission_held(&self, _: &Permission, _: Pid, _: Uid) -> bool {
///         true
///     }
///     fn op_for_permission(&self, _: &Permission) -> OpCode {
///         OpCode::NONE
///     }
///     fn policy_mode(&self, _: OpCode, _: Uid, _: Option<&PackageName>) -> PolicyMode {
///         PolicyMode::Allowed
///     }
/// }
///
/// let oracle = AllowAll;
/// assert!(oracle.permission_held(&Permission::new("x"), Pid::new(1), Uid::new(10_001)));
/// ```
pub trait PolicyOracle: Send + Sync + fmt::Debug {
    /// Does process `pid` running as `uid` hold `permission`?
    fn permission_held(&self, permission: &Permission, pid: Pid, uid: Uid) -> bool;

    /// The op code gating `permission`, or [`OpCode::NONE`].
    fn op_for_permission(&self, permission: &Permission) -> OpCode;

    /// The mode of `op` for the caller `uid` acting as `package`.
    fn policy_mode(&self, op: OpCode, uid: Uid, package: Option<&PackageName>) -> PolicyMode;
}

/// Verifies that a claimed package belongs to a uid.
pub trait PackageVerifier: Send + Sync + fmt::Debug {
    /// Returns `true` if `package` is installed under `uid`.
    fn package_belongs_to(&self, package: &PackageName, uid: Uid) -> bool;
}
