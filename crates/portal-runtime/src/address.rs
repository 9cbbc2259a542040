//! Address codec: tenant scoping and authority ownership.
//!
//! Every inbound locator passes through this module before anything else
//! looks at it:
//!
//! ```text
//! content://10@com.example.notes//items/7
//!     │
//!     ├── validate_authority   bare authority ∈ AuthoritySet?
//!     ├── accepts_tenant       10 == resource tenant, redirect or single-tenant?
//!     ├── normalize_path       //items/7 → /items/7
//!     │
//!     └── strip_for_resource   content://com.example.notes/items/7
//!                                 (prefix kept when single-tenant)
//! ```
//!
//! Results flowing back out get the caller's tenant re-attached with
//! [`with_tenant`].

use crate::resource::{AuthoritySet, ResourceDescriptor};
use portal_types::{ErrorCode, Locator, TenantId};
use thiserror::Error;
use tracing::warn;

/// Errors raised while validating an inbound address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The authority does not belong to this resource.
    #[error("the authority of '{target}' does not match the resource's authorities [{expected}]")]
    AuthorityMismatch {
        /// Offending locator or authority.
        target: String,
        /// Declared authorities, `;`-separated.
        expected: String,
    },

    /// The locator names a tenant this instance does not serve.
    #[error("locator '{locator}' is in tenant {tenant}, resource runs in tenant {resource_tenant}")]
    CrossTenant {
        /// Offending locator.
        locator: String,
        /// Tenant named by the locator.
        tenant: TenantId,
        /// Tenant the resource runs in.
        resource_tenant: TenantId,
    },
}

impl ErrorCode for AddressError {
    fn code(&self) -> &'static str {
        match self {
            Self::AuthorityMismatch { .. } => "ADDRESS_AUTHORITY_MISMATCH",
            Self::CrossTenant { .. } => "ADDRESS_CROSS_TENANT",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Splits an authority string into its tenant prefix and bare name.
///
/// A prefix that is not a number is logged and treated as absent.
fn split_authority(authority: &str) -> (TenantId, &str) {
    match authority.rsplit_once('@') {
        Some((prefix, bare)) => match prefix.parse::<u32>() {
            Ok(id) if id != u32::MAX => (TenantId::new(id), bare),
            _ => {
                warn!(authority, prefix, "non-numeric tenant prefix, treating as current tenant");
                (TenantId::CURRENT, bare)
            }
        },
        None => (TenantId::CURRENT, authority),
    }
}

/// Tenant encoded in `locator`, or [`TenantId::CURRENT`].
#[must_use]
pub fn tenant_of(locator: &Locator) -> TenantId {
    split_authority(locator.authority()).0
}

/// `locator` with any tenant prefix removed.
#[must_use]
pub fn without_tenant(locator: &Locator) -> Locator {
    if locator.has_tenant() {
        locator.with_authority(locator.bare_authority())
    } else {
        locator.clone()
    }
}

/// Checks that a raw authority string (possibly tenant-prefixed) is one
/// of `authorities`.
///
/// # Errors
///
/// Returns [`AddressError::AuthorityMismatch`] otherwise.
pub fn validate_authority_name(
    authority: &str,
    authorities: &AuthoritySet,
) -> Result<(), AddressError> {
    let (_, bare) = split_authority(authority);
    if authorities.contains(bare) {
        Ok(())
    } else {
        Err(AddressError::AuthorityMismatch {
            target: authority.to_string(),
            expected: authorities.to_string(),
        })
    }
}

/// Checks that the authority of `locator` is one of `authorities`.
///
/// # Errors
///
/// Returns [`AddressError::AuthorityMismatch`] otherwise.
pub fn validate_authority(
    locator: &Locator,
    authorities: &AuthoritySet,
) -> Result<(), AddressError> {
    validate_authority_name(locator.authority(), authorities).map_err(|err| match err {
        AddressError::AuthorityMismatch { expected, .. } => AddressError::AuthorityMismatch {
            target: locator.to_string(),
            expected,
        },
        other => other,
    })
}

/// Collapses runs of `/` in the path into one.
#[must_use]
pub fn normalize_path(locator: &Locator) -> Locator {
    let path = locator.path();
    if !path.contains("//") {
        return locator.clone();
    }

    let mut collapsed = String::with_capacity(path.len());
    let mut prev_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if !prev_slash {
                collapsed.push(ch);
            }
            prev_slash = true;
        } else {
            collapsed.push(ch);
            prev_slash = false;
        }
    }

    let normalized = locator.with_path(collapsed);
    warn!(from = %locator, to = %normalized, "normalized locator path");
    normalized
}

/// Strips the tenant prefix unless the resource is single-tenant.
#[must_use]
pub fn strip_for_resource(locator: &Locator, single_tenant: bool) -> Locator {
    if single_tenant {
        locator.clone()
    } else {
        without_tenant(locator)
    }
}

/// Prepends `"<tenant>@"` to the authority of a content locator.
///
/// No-op for [`TenantId::CURRENT`], for locators that already carry a
/// prefix, and for other schemes.
///
/// # Example
///
/// ```
/// use portal_runtime::address::{with_tenant, without_tenant};
/// use portal_types::{Locator, TenantId};
///
/// let l: Locator = "content://com.example.notes/items/1".parse().unwrap();
/// let scoped = with_tenant(&l, TenantId::new(10));
/// assert_eq!(scoped.to_string(), "content://10@com.example.notes/items/1");
/// assert_eq!(without_tenant(&scoped), l);
/// ```
#[must_use]
pub fn with_tenant(locator: &Locator, tenant: TenantId) -> Locator {
    if tenant.is_current() || locator.has_tenant() || !locator.is_content() {
        return locator.clone();
    }
    locator.with_authority(format!("{}@{}", tenant.get(), locator.authority()))
}

/// Full inbound validation: authority ownership, tenant acceptance, then
/// path normalization. Returns the normalized locator, tenant prefix
/// intact.
///
/// # Errors
///
/// - [`AddressError::AuthorityMismatch`] for a foreign authority
/// - [`AddressError::CrossTenant`] for a tenant this instance does not serve
pub fn validate_incoming(
    locator: &Locator,
    resource: &ResourceDescriptor,
) -> Result<Locator, AddressError> {
    validate_authority(locator, &resource.authorities)?;

    let tenant = tenant_of(locator);
    if !resource.accepts_tenant(tenant) {
        return Err(AddressError::CrossTenant {
            locator: locator.to_string(),
            tenant,
            resource_tenant: resource.tenant,
        });
    }

    Ok(normalize_path(locator))
}
