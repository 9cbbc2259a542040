//! Authorization for gateway calls.
//!
//! # Architecture
//!
//! ```text
//! portal-auth (traits + data)           portal-runtime (THIS MODULE)
//! ───────────────────────────           ─────────────────────────────
//! PolicyOracle, PackageVerifier  ◄────  StaticPolicyOracle
//! GrantTable                     ◄────  DefaultGrantTable
//! AccessDecision                 ◄────  AuthorizationEngine::check_read / check_write
//! ```
//!
//! # Audit Logging
//!
//! Every decision is logged with caller uid, package, locator and mode:
//! allowed at debug level, ignored and errored at warn level.

mod engine;
mod grant_table;
mod oracle;

pub use engine::AuthorizationEngine;
pub use grant_table::DefaultGrantTable;
pub use oracle::{StaticPolicyOracle, StaticPolicyOracleBuilder};
