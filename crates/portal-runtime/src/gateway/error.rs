//! Gateway errors.
//!
//! Every gateway entry point returns [`GatewayError`], which wraps the
//! error of whichever layer refused the call.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`GatewayError::Address`] | `ADDRESS_*` | No |
//! | [`GatewayError::AccessDenied`] | `GATEWAY_ACCESS_DENIED` | No |
//! | [`GatewayError::BatchPolicyIgnored`] | `GATEWAY_BATCH_IGNORED` | No |
//! | [`GatewayError::Batch`] | `BATCH_*` / `STORE_*` | From source |
//! | [`GatewayError::Store`] | `STORE_*` | Endpoint loss only |
//! | [`GatewayError::Context`] | `CONTEXT_*` | No |
//! | [`GatewayError::Grant`] | `GRANT_*` | No |
//! | [`GatewayError::Cancelled`] | `GATEWAY_CANCELLED` | No |

use crate::address::AddressError;
use crate::batch::BatchError;
use crate::context::ContextError;
use crate::store::StoreError;
use portal_auth::{AccessDenied, GrantError};
use portal_types::{ErrorCode, Locator};
use thiserror::Error;

/// Why a gateway call did not complete.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The locator or authority was rejected before authorization.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// The authorization engine refused the call.
    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),

    /// An operation inside a batch was silently suppressed by policy.
    /// Batches cannot be partially faked, so the whole batch is refused.
    #[error("app op not allowed: batch operation {index} on {locator}")]
    BatchPolicyIgnored {
        /// Index of the suppressed operation.
        index: usize,
        /// Its target, tenant-stripped.
        locator: Locator,
    },

    /// The batch failed or was malformed.
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// The store failed the call.
    #[error(transparent)]
    Store(StoreError),

    /// The caller identity could not be established.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The grant table could not be read.
    #[error(transparent)]
    Grant(#[from] GrantError),

    /// The caller cancelled before or during the call.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Cancelled => Self::Cancelled,
            other => Self::Store(other),
        }
    }
}

impl ErrorCode for GatewayError {
    fn code(&self) -> &'static str {
        match self {
            Self::Address(e) => e.code(),
            Self::AccessDenied(e) => e.code(),
            Self::BatchPolicyIgnored { .. } => "GATEWAY_BATCH_IGNORED",
            Self::Batch(e) => e.code(),
            Self::Store(e) => e.code(),
            Self::Context(e) => e.code(),
            Self::Grant(e) => e.code(),
            Self::Cancelled => "GATEWAY_CANCELLED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Batch(e) => e.is_recoverable(),
            Self::Store(e) => e.is_recoverable(),
            _ => false,
        }
    }
}
