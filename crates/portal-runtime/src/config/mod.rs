//! Configuration management with hierarchical layering.
//!
//! # Architecture
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌───────────────────────────────────────────┐
//! │  1. Environment Variables (PORTAL_*)      │  Runtime override
//! ├───────────────────────────────────────────┤
//! │  2. Explicit File (--config)              │  Per invocation
//! ├───────────────────────────────────────────┤
//! │  3. Project Config (.portal/config.toml)  │  Project-specific
//! ├───────────────────────────────────────────┤
//! │  4. Global Config (~/.portal/config.toml) │  User defaults
//! ├───────────────────────────────────────────┤
//! │  5. Default Values (compile-time)         │  Fallback
//! └───────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `PORTAL_EXPORTED` | `resource.exported` | bool |
//! | `PORTAL_SINGLE_TENANT` | `resource.single_tenant` | bool |
//! | `PORTAL_STABLE_CHANNEL` | `resource.stable_channel` | bool |
//! | `PORTAL_AUTHORITIES` | `resource.authorities` | `;`-separated list |
//! | `PORTAL_OWNER_UID` | `resource.owner_uid` | u32 |
//!
//! # Example Configuration
//!
//! ```toml
//! # .portal/config.toml
//!
//! [resource]
//! authorities = ["com.example.notes"]
//! owner_uid = 10001
//! owner_package = "com.example.notes"
//! read_permission = "com.example.notes.READ"
//! write_permission = "com.example.notes.WRITE"
//! write_op = 12
//!
//! [[resource.path_rules]]
//! path = "/private/*"
//! kind = "glob"
//! read_permission = "com.example.notes.PRIVATE"
//!
//! [[simulation.held]]
//! uid = 10050
//! permission = "com.example.notes.READ"
//! ```

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{
    GrantConfig, HeldPermission, OpMapping, OpModeConfig, PackageOwner, PathRuleConfig, PatternKind,
    PortalConfig, ResourceConfig, SimulationConfig,
};

/// Default global config directory.
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".portal")
}

/// Default global config file path.
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}

/// Project config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".portal";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "config.toml";
