//! Per-operation batch results.

use crate::address;
use portal_types::{Locator, TenantId};
use std::fmt;

/// Outcome of one batch operation, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchResult {
    /// Locator of an inserted row.
    Locator(Locator),
    /// Rows affected (update, delete) or matched (assert).
    Count(usize),
    /// A `failure_allowed` operation failed with this message.
    Failure(String),
}

impl BatchResult {
    /// The locator of an insert result.
    #[must_use]
    pub fn locator(&self) -> Option<&Locator> {
        match self {
            Self::Locator(l) => Some(l),
            _ => None,
        }
    }

    /// The count of an update, delete or assert result.
    #[must_use]
    pub fn count(&self) -> Option<usize> {
        match self {
            Self::Count(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns `true` for [`BatchResult::Failure`].
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Re-attaches `tenant` to a locator result.
    #[must_use]
    pub fn with_tenant(self, tenant: TenantId) -> Self {
        match self {
            Self::Locator(l) => Self::Locator(address::with_tenant(&l, tenant)),
            other => other,
        }
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locator(l) => write!(f, "locator={l}"),
            Self::Count(n) => write!(f, "count={n}"),
            Self::Failure(msg) => write!(f, "failure={msg}"),
        }
    }
}
