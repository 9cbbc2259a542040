//! Access denied error.
//!
//! [`AccessDenied`] is raised when a decision comes out
//! [`Errored`](crate::AccessDecision::Errored):
//!
//! ```text
//! AccessDecision::Errored { missing_permission, hint }
//!          │
//!          └── AccessDenied { kind, locator, caller, missing_permission, hint }
//! ```

use crate::{AccessKind, Permission};
use portal_types::{CallIdentity, ErrorCode, Locator};
use thiserror::Error;

/// A read or write refused by the authorization engine.
///
/// # Example
///
/// ```
/// use portal_auth::{AccessDenied, AccessKind, Permission};
/// use portal_types::{CallIdentity, Pid, Uid};
///
/// let err = AccessDenied {
///     kind: AccessKind::Read,
///     locator: "content://com.example.notes/items".parse().unwrap(),
///     caller: CallIdentity::new(Uid::new(10_050), Pid::new(9)),
///     missing_permission: Some(Permission::new("notes.READ")),
///     hint: "requires notes.READ, or an explicit grant".into(),
/// };
///
/// assert!(err.to_string().contains("requires notes.READ"));
/// ```
#[derive(Debug, Clone, Error)]
#[error("permission denial: {kind} of {locator} by {caller} {hint}")]
pub struct AccessDenied {
    /// Direction of the refused access.
    pub kind: AccessKind,
    /// Target, as seen after tenant stripping.
    pub locator: Locator,
    /// Who was refused.
    pub caller: CallIdentity,
    /// The last permission found missing.
    pub missing_permission: Option<Permission>,
    /// Remedy text.
    pub hint: String,
}

impl ErrorCode for AccessDenied {
    fn code(&self) -> &'static str {
        "GATEWAY_ACCESS_DENIED"
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
