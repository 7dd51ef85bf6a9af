//! Statically registered migration units
//!
//! Every migration unit is a struct implementing [`MigrationUnit`],
//! registered at compile time under one or more [`MigrationSet`]s. Unit
//! names carry a `YYYY_MM_DD_NNNNNN_` prefix so lexical order equals
//! authoring order; the lifecycle manager applies pending units in that
//! order, one transaction per unit, and records each in the per-database
//! ledger exactly once.

pub mod ledger;
pub mod units;

use async_trait::async_trait;
use sea_orm::{DatabaseTransaction, DbErr};
use serde::{Deserialize, Serialize};

use units::{
    CreateClients, CreateDomainBindings, CreatePermissions, CreateRoles, CreateStores,
    CreateTenantMirror, CreateTenants, CreateUsers,
};

/// One discrete, idempotent schema change with a stable name.
#[async_trait]
pub trait MigrationUnit: Send + Sync {
    /// Stable identifier, prefixed with an ordering timestamp.
    fn name(&self) -> &'static str;

    /// Apply the schema change inside the supplied transaction.
    async fn apply(&self, tx: &DatabaseTransaction) -> Result<(), DbErr>;
}

/// Named group of migration units applied together to one database kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MigrationSet {
    /// Shared/default database schema
    Default,
    /// A tenant's dedicated database
    Tenant,
    /// A client's dedicated database
    Client,
    /// A store's dedicated database
    Store,
}

static DEFAULT_UNITS: &[&dyn MigrationUnit] = &[
    &CreateTenants,
    &CreateDomainBindings,
    &CreateClients,
    &CreateStores,
];

static TENANT_UNITS: &[&dyn MigrationUnit] = &[
    &CreateRoles,
    &CreatePermissions,
    &CreateUsers,
    &CreateTenantMirror,
];

// Client and store databases carry the same baseline security tables as a
// tenant database, minus the tenant mirror row.
static OWNER_UNITS: &[&dyn MigrationUnit] = &[&CreateRoles, &CreatePermissions, &CreateUsers];

impl MigrationSet {
    /// Units belonging to this set, in registration order.
    pub fn units(&self) -> &'static [&'static dyn MigrationUnit] {
        match self {
            MigrationSet::Default => DEFAULT_UNITS,
            MigrationSet::Tenant => TENANT_UNITS,
            MigrationSet::Client | MigrationSet::Store => OWNER_UNITS,
        }
    }
}

impl std::fmt::Display for MigrationSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationSet::Default => write!(f, "default"),
            MigrationSet::Tenant => write!(f, "tenant"),
            MigrationSet::Client => write!(f, "client"),
            MigrationSet::Store => write!(f, "store"),
        }
    }
}

impl std::str::FromStr for MigrationSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(MigrationSet::Default),
            "tenant" => Ok(MigrationSet::Tenant),
            "client" => Ok(MigrationSet::Client),
            "store" => Ok(MigrationSet::Store),
            other => Err(format!("unknown migration set: {}", other)),
        }
    }
}

/// Collect the units of several sets into one lexically ordered,
/// de-duplicated application plan.
pub fn plan(sets: &[MigrationSet]) -> Vec<&'static dyn MigrationUnit> {
    let mut units: Vec<&'static dyn MigrationUnit> = Vec::new();
    for set in sets {
        for unit in set.units() {
            if !units.iter().any(|u| u.name() == unit.name()) {
                units.push(*unit);
            }
        }
    }
    units.sort_by_key(|u| u.name());
    units
}
