//! Portal CLI - offline access decision checker
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. Environment variables (`PORTAL_*`) (highest priority)
//! 2. Explicit file (`--config`)
//! 3. Project config (`.portal/config.toml` in the project root)
//! 4. Global config (`~/.portal/config.toml`)
//! 5. Default values (lowest priority)
//!
//! The `[simulation]` section stands in for the live permission system:
//! held permissions, op modes, grants and package owners.
//!
//! # Exit Codes
//!
//! | Code | `check` decision |
//! |------|------------------|
//! | 0 | allowed |
//! | 1 | not decided (bad input, config or address) |
//! | 2 | ignored |
//! | 3 | errored |

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use portal_auth::{AccessDecision, AccessKind, GrantTable};
use portal_runtime::address;
use portal_runtime::auth::{AuthorizationEngine, DefaultGrantTable};
use portal_runtime::config::{ConfigLoader, PortalConfig};
use portal_runtime::context::CallContext;
use portal_types::{CallIdentity, Locator, PackageName, Pid, TenantId, Uid};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Portal CLI - offline access decision checker
#[derive(Parser, Debug)]
#[command(name = "portal")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Explicit config file, merged over global and project config
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Project root directory (defaults to current directory)
    #[arg(short = 'C', long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide whether a caller may read or write a locator
    Check {
        /// Direction of access
        access: Access,

        /// Target locator, e.g. content://com.example.notes/items/1
        locator: String,

        /// Calling uid
        #[arg(long)]
        uid: u32,

        /// Calling pid
        #[arg(long, default_value_t = 0)]
        pid: u32,

        /// Package the caller claims to act for
        #[arg(long)]
        package: Option<String>,
    },

    /// Inspect or rewrite a locator's tenant and path
    Locator {
        /// What to do with the locator
        action: LocatorAction,

        /// Locator to operate on
        locator: String,

        /// Tenant for `with-tenant`
        #[arg(long)]
        tenant: Option<u32>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

impl From<Access> for AccessKind {
    fn from(access: Access) -> Self {
        match access {
            Access::Read => AccessKind::Read,
            Access::Write => AccessKind::Write,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LocatorAction {
    /// Remove the tenant prefix
    Strip,
    /// Prefix with `--tenant`
    WithTenant,
    /// Collapse repeated slashes in the path
    Normalize,
    /// Print the tenant the locator names
    Tenant,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Terminal filter: --debug > --verbose > RUST_LOG env > default "warn"
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .init();

    match &args.command {
        Command::Check {
            access,
            locator,
            uid,
            pid,
            package,
        } => {
            let config = load_config(&args)?;
            let caller = caller_identity(*uid, *pid, package.as_deref())?;
            let decision = check(&config, (*access).into(), &parse_locator(locator)?, &caller)?;
            Ok(ExitCode::from(report(&decision)))
        }
        Command::Locator {
            action,
            locator,
            tenant,
        } => {
            println!("{}", rewrite_locator(*action, &parse_locator(locator)?, *tenant)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Config => {
            let config = load_config(&args)?;
            print!("{}", config.to_toml().context("failed to serialize config")?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(args: &Args) -> Result<PortalConfig> {
    let project_root = match &args.project {
        Some(p) => p.clone(),
        None => std::env::current_dir().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to get current directory, using '.'");
            PathBuf::from(".")
        }),
    };
    info!(path = %project_root.display(), "Project root");

    let mut loader = ConfigLoader::new().with_project_root(&project_root);
    if let Some(ref path) = args.config {
        loader = loader.with_file(path);
    }
    loader.load().context("Config error")
}

fn parse_locator(raw: &str) -> Result<Locator> {
    raw.parse().with_context(|| format!("invalid locator '{raw}'"))
}

fn caller_identity(uid: u32, pid: u32, package: Option<&str>) -> Result<CallIdentity> {
    let identity = CallIdentity::new(Uid::new(uid), Pid::new(pid));
    match package {
        Some(name) => {
            let package = PackageName::try_from(name)
                .with_context(|| format!("invalid package '{name}'"))?;
            Ok(identity.with_package(package))
        }
        None => Ok(identity),
    }
}

/// Runs the inbound pipeline up to the authorization decision, against
/// the simulated permission system.
fn check(
    config: &PortalConfig,
    kind: AccessKind,
    locator: &Locator,
    caller: &CallIdentity,
) -> Result<AccessDecision> {
    let resource = config.resource_descriptor()?;
    let oracle = Arc::new(config.simulation.oracle()?);
    let grants = Arc::new(DefaultGrantTable::new());
    grants.restore_grants(&config.simulation.grant_list()?)?;
    debug!(grants = grants.grant_count(), "Restored simulated grants");

    // The asserted package must belong to the uid, as on a live call
    let cx = CallContext::new(oracle.clone());
    let _scope = cx.enter(caller.clone());
    cx.current_package()?;

    let validated = address::validate_incoming(locator, &resource)?;
    let target = address::strip_for_resource(&validated, resource.single_tenant);
    let engine = AuthorizationEngine::new(oracle, grants);
    Ok(engine.check(kind, &target, caller, &resource))
}

/// Prints `decision` and returns its exit code.
fn report(decision: &AccessDecision) -> u8 {
    println!("decision: {}", decision.mode());
    match decision {
        AccessDecision::Allowed => 0,
        AccessDecision::Ignored => 2,
        AccessDecision::Errored {
            missing_permission,
            hint,
        } => {
            if let Some(permission) = missing_permission {
                println!("missing: {permission}");
            }
            println!("hint: {hint}");
            3
        }
    }
}

fn rewrite_locator(
    action: LocatorAction,
    locator: &Locator,
    tenant: Option<u32>,
) -> Result<String> {
    let out = match action {
        LocatorAction::Strip => address::without_tenant(locator).to_string(),
        LocatorAction::WithTenant => {
            let Some(tenant) = tenant else {
                bail!("with-tenant requires --tenant");
            };
            address::with_tenant(locator, TenantId::new(tenant)).to_string()
        }
        LocatorAction::Normalize => address::normalize_path(locator).to_string(),
        LocatorAction::Tenant => address::tenant_of(locator).to_string(),
    };
    Ok(out)
}
