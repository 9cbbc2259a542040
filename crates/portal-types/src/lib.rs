//! Core types for Portal.
//!
//! This crate provides the value types shared by every layer of the
//! Portal gateway: resource addresses, caller identity, and row data.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Contract Layer                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  portal-types   : Locator, CallIdentity, Value  ◄── HERE     │
//! │  portal-auth    : AccessDecision, PermissionDeclaration     │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Runtime Layer                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  portal-runtime : address, context, auth, batch, gateway    │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Frontend Layer                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  portal-cli     : offline decision checker                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use portal_types::{CallIdentity, Locator, Pid, TenantId, Uid};
//!
//! let locator: Locator = "content://10@com.example.notes/items/7".parse().unwrap();
//! assert_eq!(locator.tenant(), TenantId::new(10));
//! assert_eq!(locator.bare_authority(), "com.example.notes");
//! assert_eq!(locator.trailing_id(), Some(7));
//!
//! let caller = CallIdentity::new(Uid::new(1_010_123), Pid::new(4242));
//! assert_eq!(caller.uid.tenant(), TenantId::new(10));
//! ```

mod construct;
mod error;
mod identity;
mod locator;
mod value;

pub use construct::TryNew;
pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use identity::{CallIdentity, PackageName, PackageNameError, Pid, TenantId, Uid};
pub use locator::{Locator, LocatorError, CONTENT_SCHEME};
pub use value::{ContentValues, RowSet, Value};
