//! Access outcomes and their severity ordering.
//!
//! ```text
//! Allowed  <  Ignored  <  Errored
//!   │           │           │
//!   │           │           └── hard denial: caller gets an access error
//!   │           └── soft denial: caller gets an empty / no-op result
//!   └── proceed
//! ```
//!
//! When several checks deny, the *strongest* denial is retained via
//! [`AccessMode::strongest`].

use crate::Permission;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single permission or policy check.
///
/// Ordering is expressed through [`severity`](Self::severity) and
/// [`strongest`](Self::strongest) rather than a derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Access proceeds.
    Allowed,
    /// Access is silently degraded.
    Ignored,
    /// Access fails with an error.
    Errored,
}

impl AccessMode {
    /// Rank of this mode: `Allowed = 0`, `Ignored = 1`, `Errored = 2`.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::Allowed => 0,
            Self::Ignored => 1,
            Self::Errored => 2,
        }
    }

    /// Returns the more severe of the two modes.
    ///
    /// # Example
    ///
    /// ```
    /// use portal_auth::AccessMode;
    ///
    /// assert_eq!(AccessMode::Allowed.strongest(AccessMode::Ignored), AccessMode::Ignored);
    /// assert_eq!(AccessMode::Errored.strongest(AccessMode::Ignored), AccessMode::Errored);
    /// ```
    #[must_use]
    pub const fn strongest(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Returns `true` for [`AccessMode::Allowed`].
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Ignored => "ignored",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final access decision for one read or write against a locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Access proceeds.
    Allowed,
    /// Access is degraded to an empty / no-op result.
    Ignored,
    /// Access is refused.
    Errored {
        /// The last permission found missing, if any was declared.
        missing_permission: Option<Permission>,
        /// Human-readable remedy, e.g. `"requires P, or an explicit grant"`.
        hint: String,
    },
}

impl AccessDecision {
    /// The mode this decision corresponds to.
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        match self {
            Self::Allowed => AccessMode::Allowed,
            Self::Ignored => AccessMode::Ignored,
            Self::Errored { .. } => AccessMode::Errored,
        }
    }

    /// Returns `true` for [`AccessDecision::Allowed`].
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Returns `true` for [`AccessDecision::Ignored`].
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }

    /// Returns `true` for [`AccessDecision::Errored`].
    #[must_use]
    pub fn is_errored(&self) -> bool {
        matches!(self, Self::Errored { .. })
    }

    /// The missing permission of an errored decision.
    #[must_use]
    pub fn missing_permission(&self) -> Option<&Permission> {
        match self {
            Self::Errored {
                missing_permission, ..
            } => missing_permission.as_ref(),
            _ => None,
        }
    }
}
