//! Migration unit mirroring the tenants table into a tenant's own database.
//!
//! Tenant databases carry a copy of the shared tenants table so a tenant
//! record can be duplicated into the dedicated database at creation time.

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbErr};

use crate::migration::MigrationUnit;

use super::tenants::tenants_table;

pub struct CreateTenantMirror;

#[async_trait]
impl MigrationUnit for CreateTenantMirror {
    fn name(&self) -> &'static str {
        "2024_06_01_000004_create_tenant_mirror"
    }

    async fn apply(&self, tx: &DatabaseTransaction) -> Result<(), DbErr> {
        let backend = tx.get_database_backend();
        tx.execute(backend.build(&tenants_table())).await?;
        Ok(())
    }
}
