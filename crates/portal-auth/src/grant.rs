//! Explicit per-locator access grants.
//!
//! A grant lets one uid read and/or write one exact locator regardless of
//! the resource's declared permissions. It is the last layer consulted by
//! the authorization engine:
//!
//! ```text
//! Decision = SelfAccess ∪ (Exported ∧ SameTenant ∧ Declared) ∪ ExplicitGrant
//!                                                              ▲
//!                                                   THIS MODULE
//! ```
//!
//! # Architecture
//!
//! ```text
//! GrantTable trait (portal-auth)          ← trait definition (THIS MODULE)
//!          │
//!          └── DefaultGrantTable (portal-runtime)   ← concrete impl
//! ```

use bitflags::bitflags;
use portal_types::{ErrorCode, Locator, Uid};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::AccessKind;

/// Error returned by grant operations that access internal state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrantError {
    /// Internal lock was poisoned (a thread panicked while holding it).
    #[error("grant table lock poisoned: {context}")]
    LockPoisoned {
        /// Which lock was poisoned.
        context: String,
    },
}

impl ErrorCode for GrantError {
    fn code(&self) -> &'static str {
        match self {
            Self::LockPoisoned { .. } => "GRANT_LOCK_POISONED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

bitflags! {
    /// Access directions covered by a grant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct GrantMode: u8 {
        /// Read access.
        const READ  = 0b01;
        /// Write access.
        const WRITE = 0b10;
    }
}

impl From<AccessKind> for GrantMode {
    fn from(kind: AccessKind) -> Self {
        match kind {
            AccessKind::Read => Self::READ,
            AccessKind::Write => Self::WRITE,
        }
    }
}

/// The lifetime of a [`LocatorGrant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantKind {
    /// Valid until explicitly revoked.
    Persistent,
    /// Consumed by the first check it satisfies.
    OneTime,
}

/// One explicit grant.
///
/// # Example
///
/// ```
/// use portal_auth::{GrantKind, GrantMode, LocatorGrant};
/// use portal_types::{ErrorCode, Locator, Uid};
///
/// let locator: Locator = "content://com.example.notes/items/7".parse().unwrap();
/// let grant = LocatorGrant::persistent(locator, Uid::new(10_050), GrantMode::READ);
/// assert_eq!(grant.kind, GrantKind::Persistent);
/// assert!(grant.covers(GrantMode::READ));
/// assert!(!grant.covers(GrantMode::WRITE));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocatorGrant {
    /// Exact locator the grant applies to.
    pub locator: Locator,
    /// Grantee.
    pub uid: Uid,
    /// Directions granted.
    pub mode: GrantMode,
    /// Lifetime.
    pub kind: GrantKind,
}

impl LocatorGrant {
    /// Creates a persistent grant.
    #[must_use]
    pub fn persistent(locator: Locator, uid: Uid, mode: GrantMode) -> Self {
        Self {
            locator,
            uid,
            mode,
            kind: GrantKind::Persistent,
        }
    }

    /// Creates a one-time grant.
    #[must_use]
    pub fn one_time(locator: Locator, uid: Uid, mode: GrantMode) -> Self {
        Self {
            locator,
            uid,
            mode,
            kind: GrantKind::OneTime,
        }
    }

    /// Returns `true` if every direction in `mode` is granted.
    #[must_use]
    pub fn covers(&self, mode: GrantMode) -> bool {
        self.mode.contains(mode)
    }

    /// Returns `true` if this grant satisfies a check for
    /// (`locator`, `uid`, `mode`).
    #[must_use]
    pub fn satisfies(&self, locator: &Locator, uid: Uid, mode: GrantMode) -> bool {
        self.uid == uid && self.covers(mode) && &self.locator == locator
    }
}

/// Explicit grant management.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one table is shared by every
/// gateway call.
pub trait GrantTable: Send + Sync + std::fmt::Debug {
    /// Adds a grant.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError`] if internal state is inaccessible.
    fn grant(&self, grant: LocatorGrant) -> Result<(), GrantError>;

    /// Removes `mode` from every grant of `locator` to `uid`. Grants left
    /// with no direction are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError`] if internal state is inaccessible.
    fn revoke(&self, locator: &Locator, uid: Uid, mode: GrantMode) -> Result<(), GrantError>;

    /// Checks whether `uid` was granted `mode` on exactly `locator`.
    /// A matching one-time grant is consumed.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError`] if internal state is inaccessible.
    fn has_grant(&self, locator: &Locator, uid: Uid, mode: GrantMode) -> Result<bool, GrantError>;

    /// Removes every grant.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError`] if internal state is inaccessible.
    fn clear(&self) -> Result<(), GrantError>;

    /// Number of active grants.
    fn grant_count(&self) -> usize;

    /// Snapshot of every active grant.
    fn list_grants(&self) -> Vec<LocatorGrant>;
}
