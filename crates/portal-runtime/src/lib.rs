//! Portal Runtime - the gateway and everything behind it.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Contract Layer                          │
//! │  portal-types : Locator, CallIdentity, Value                │
//! │  portal-auth  : AccessDecision, PolicyOracle, GrantTable    │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Runtime Layer (THIS CRATE)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  address/  : authority + tenant validation, stripping       │
//! │  context/  : CallContext identity frames, cancellation      │
//! │  auth/     : AuthorizationEngine, grant table, oracle       │
//! │  batch/    : BatchOperation, back-references, BatchEngine   │
//! │  store/    : Store trait, TracingStore                      │
//! │  gateway/  : Gateway entry points                           │
//! │  config/   : PortalConfig, ConfigLoader                     │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Frontend Layer                             │
//! │  portal-cli : offline decision checker                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! ## [`gateway`] - Entry Points
//!
//! - [`Gateway`](gateway::Gateway): validates, authorizes, delegates
//! - [`ConnectionManager`](gateway::ConnectionManager): endpoint loss sink
//!
//! ## [`auth`] - Authorization
//!
//! - [`AuthorizationEngine`](auth::AuthorizationEngine): layered decision
//! - [`DefaultGrantTable`](auth::DefaultGrantTable): explicit grants
//! - [`StaticPolicyOracle`](auth::StaticPolicyOracle): table-driven oracle
//!
//! ## [`batch`] - Batch Mutations
//!
//! - [`BatchOperation`](batch::BatchOperation): one step, built and validated
//! - [`BatchEngine`](batch::BatchEngine): sequential applier
//!
//! ## [`testing`] - Test Doubles
//!
//! - [`MemoryStore`](testing::MemoryStore), [`RecordingOracle`](testing::RecordingOracle)

pub mod address;
pub mod auth;
pub mod batch;
pub mod config;
pub mod context;
pub mod gateway;
pub mod store;
pub mod testing;

mod resource;

pub use gateway::{Gateway, GatewayError};
pub use resource::{AuthoritySet, ResourceDescriptor, CROSS_TENANT_PERMISSION};
