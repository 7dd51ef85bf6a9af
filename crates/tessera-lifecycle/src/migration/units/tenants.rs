//! Migration unit creating the tenants table.

use async_trait::async_trait;
use sea_orm::sea_query::{ColumnDef, Expr, Table, TableCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbErr, DeriveIden};

use crate::migration::MigrationUnit;

#[derive(DeriveIden)]
pub(super) enum Tenants {
    Table,
    Id,
    Name,
    Domain,
    Status,
    DatabaseName,
    Settings,
    Email,
    DeletedAt,
    GmtCreate,
    GmtModified,
}

/// Table definition, shared with the tenant-mirror unit so a tenant's
/// own database carries an identically shaped copy.
pub(super) fn tenants_table() -> TableCreateStatement {
    Table::create()
        .table(Tenants::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Tenants::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(Tenants::Name).string().not_null())
        .col(ColumnDef::new(Tenants::Domain).string_len(191).unique_key())
        .col(
            ColumnDef::new(Tenants::Status)
                .string_len(16)
                .not_null()
                .default("draft"),
        )
        .col(ColumnDef::new(Tenants::DatabaseName).string_len(64))
        .col(ColumnDef::new(Tenants::Settings).json())
        .col(ColumnDef::new(Tenants::Email).string())
        .col(ColumnDef::new(Tenants::DeletedAt).timestamp())
        .col(
            ColumnDef::new(Tenants::GmtCreate)
                .timestamp()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(
            ColumnDef::new(Tenants::GmtModified)
                .timestamp()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .to_owned()
}

pub struct CreateTenants;

#[async_trait]
impl MigrationUnit for CreateTenants {
    fn name(&self) -> &'static str {
        "2024_05_01_000001_create_tenants"
    }

    async fn apply(&self, tx: &DatabaseTransaction) -> Result<(), DbErr> {
        let backend = tx.get_database_backend();
        tx.execute(backend.build(&tenants_table())).await?;
        Ok(())
    }
}
