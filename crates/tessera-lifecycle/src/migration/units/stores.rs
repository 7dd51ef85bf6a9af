//! Migration unit creating the stores table.

use async_trait::async_trait;
use sea_orm::sea_query::{ColumnDef, Expr, Index, Table};
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbErr, DeriveIden};

use crate::migration::MigrationUnit;

#[derive(DeriveIden)]
enum Stores {
    Table,
    Id,
    TenantId,
    ClientId,
    Name,
    DatabaseName,
    DeletedAt,
    GmtCreate,
    GmtModified,
}

pub struct CreateStores;

#[async_trait]
impl MigrationUnit for CreateStores {
    fn name(&self) -> &'static str {
        "2024_05_01_000004_create_stores"
    }

    async fn apply(&self, tx: &DatabaseTransaction) -> Result<(), DbErr> {
        let backend = tx.get_database_backend();

        let table = Table::create()
            .table(Stores::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Stores::Id)
                    .big_integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(Stores::TenantId).big_integer().not_null())
            .col(ColumnDef::new(Stores::ClientId).big_integer())
            .col(ColumnDef::new(Stores::Name).string().not_null())
            .col(ColumnDef::new(Stores::DatabaseName).string_len(64))
            .col(ColumnDef::new(Stores::DeletedAt).timestamp())
            .col(
                ColumnDef::new(Stores::GmtCreate)
                    .timestamp()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(Stores::GmtModified)
                    .timestamp()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .to_owned();
        tx.execute(backend.build(&table)).await?;

        let tenant_index = Index::create()
            .name("idx_stores_tenant")
            .table(Stores::Table)
            .col(Stores::TenantId)
            .to_owned();
        super::create_index(tx, &tenant_index).await?;

        let client_index = Index::create()
            .name("idx_stores_client")
            .table(Stores::Table)
            .col(Stores::ClientId)
            .to_owned();
        super::create_index(tx, &client_index).await?;

        Ok(())
    }
}
