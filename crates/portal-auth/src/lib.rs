//! Permission primitives for Portal.
//!
//! This crate defines *what* an access decision is and the interfaces
//! the decision is computed against. The decision algorithm itself
//! lives in `portal-runtime`.
//!
//! # Layered Access Model
//!
//! ```text
//! Decision = SelfAccess
//!          ∪ (Exported ∧ SameTenant ∧ (ComponentPermission ∪ PathRule ∪ DefaultAllow))
//!          ∪ ExplicitGrant
//!
//! each permission check = PermissionHeld ∧ PolicyMode(op(permission)) ⊳ PolicyOverlay
//! ```
//!
//! | Layer | Type | Answers |
//! |-------|------|---------|
//! | [`PermissionDeclaration`] | Struct | Which permissions guard the resource and its paths |
//! | [`PolicyOracle`] | Trait | Does the caller hold a permission, what is its policy mode |
//! | [`GrantTable`] | Trait | Was this exact locator granted to this caller |
//! | [`AccessDecision`] | Enum | Allowed / Ignored / Errored outcome |
//!
//! # Crate Architecture
//!
//! ```text
//! portal-types  (Locator, CallIdentity)
//!      ↑
//! portal-auth   ◄── THIS CRATE (traits + data types)
//!      ↑
//! portal-runtime (AuthorizationEngine, DefaultGrantTable, StaticPolicyOracle)
//! ```

pub mod decision;
pub mod error;
pub mod grant;
pub mod permission;
pub mod policy;

pub use decision::{AccessDecision, AccessMode};
pub use error::AccessDenied;
pub use grant::{GrantError, GrantKind, GrantMode, GrantTable, LocatorGrant};
pub use permission::{AccessKind, PathPattern, PathRule, Permission, PermissionDeclaration};
pub use policy::{OpCode, PackageVerifier, PolicyMode, PolicyOracle};
