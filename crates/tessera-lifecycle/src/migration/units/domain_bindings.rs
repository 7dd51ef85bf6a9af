//! Migration unit creating the domain_bindings table.
//!
//! The domain column is unique across all bindings; the owner index
//! supports reverse lookups when an owner's domains are detached.

use async_trait::async_trait;
use sea_orm::sea_query::{ColumnDef, Expr, Index, Table};
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbErr, DeriveIden};

use crate::migration::MigrationUnit;

#[derive(DeriveIden)]
enum DomainBindings {
    Table,
    Id,
    Domain,
    TenantId,
    OwnerType,
    OwnerId,
    IsPrimary,
    GmtCreate,
    GmtModified,
}

pub struct CreateDomainBindings;

#[async_trait]
impl MigrationUnit for CreateDomainBindings {
    fn name(&self) -> &'static str {
        "2024_05_01_000002_create_domain_bindings"
    }

    async fn apply(&self, tx: &DatabaseTransaction) -> Result<(), DbErr> {
        let backend = tx.get_database_backend();

        let table = Table::create()
            .table(DomainBindings::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(DomainBindings::Id)
                    .big_integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(
                ColumnDef::new(DomainBindings::Domain)
                    .string_len(191)
                    .not_null()
                    .unique_key(),
            )
            .col(ColumnDef::new(DomainBindings::TenantId).big_integer().not_null())
            .col(ColumnDef::new(DomainBindings::OwnerType).string_len(32))
            .col(ColumnDef::new(DomainBindings::OwnerId).big_integer())
            .col(
                ColumnDef::new(DomainBindings::IsPrimary)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(
                ColumnDef::new(DomainBindings::GmtCreate)
                    .timestamp()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(DomainBindings::GmtModified)
                    .timestamp()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .to_owned();
        tx.execute(backend.build(&table)).await?;

        let owner_index = Index::create()
            .name("idx_domain_bindings_owner")
            .table(DomainBindings::Table)
            .col(DomainBindings::OwnerType)
            .col(DomainBindings::OwnerId)
            .to_owned();
        super::create_index(tx, &owner_index).await?;

        let tenant_index = Index::create()
            .name("idx_domain_bindings_tenant")
            .table(DomainBindings::Table)
            .col(DomainBindings::TenantId)
            .to_owned();
        super::create_index(tx, &tenant_index).await?;

        Ok(())
    }
}
