//! Tessera Lifecycle - database lifecycle management
//!
//! This crate owns everything between "a tenant declares a database name"
//! and "that database exists, is migrated, and is bootstrapped":
//! - `registry`: process-wide named connection configurations
//! - `migration`: statically registered migration units and the
//!    per-database ledger
//! - `manager`: database existence/creation, migration execution, and
//!    owner-record mirroring
//! - `bootstrap`: first-use provisioning of baseline security data
//! - `fleet`: the sequential batch run across all dedicated databases

pub mod bootstrap;
pub mod fleet;
pub mod manager;
pub mod migration;
pub mod registry;

pub use bootstrap::{
    AdminCredentials, LogNotifier, Notifier, ResourceAction, ResourceCatalog, RoleTemplate,
    StaticResourceCatalog, TenantBootstrap,
};
pub use fleet::{EntityMigrator, FleetConfig, FleetFilter, FleetOrchestrator};
pub use manager::{LifecycleManager, classify_db_error};
pub use migration::{MigrationSet, MigrationUnit};
pub use registry::{ConnectionProvider, ConnectionRegistry};
