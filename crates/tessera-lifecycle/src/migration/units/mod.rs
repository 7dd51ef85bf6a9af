//! Migration unit definitions
//!
//! One file per unit; the ordering prefix in each unit name is chosen at
//! authoring time and never changes.

use sea_orm::sea_query::IndexCreateStatement;
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbErr};

mod clients;
mod domain_bindings;
mod permissions;
mod roles;
mod stores;
mod tenant_mirror;
mod tenants;
mod users;

pub use clients::CreateClients;
pub use domain_bindings::CreateDomainBindings;
pub use permissions::CreatePermissions;
pub use roles::CreateRoles;
pub use stores::CreateStores;
pub use tenant_mirror::CreateTenantMirror;
pub use tenants::CreateTenants;
pub use users::CreateUsers;

/// Create an index, tolerating one left behind by an earlier run.
///
/// Tables are created with IF NOT EXISTS so units can be force
/// re-applied; CREATE INDEX has no portable equivalent (MySQL reports
/// 1061, Postgres 42P07), so the duplicate error is swallowed here.
pub(super) async fn create_index(
    tx: &DatabaseTransaction,
    stmt: &IndexCreateStatement,
) -> Result<(), DbErr> {
    let backend = tx.get_database_backend();
    match tx.execute(backend.build(stmt)).await {
        Ok(_) => Ok(()),
        Err(e)
            if e.to_string().contains("already exists")
                || e.to_string().contains("1061")
                || e.to_string().contains("42P07")
                || e.to_string().contains("Duplicate key name") =>
        {
            Ok(())
        }
        Err(e) => Err(e),
    }
}
