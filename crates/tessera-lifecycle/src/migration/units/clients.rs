//! Migration unit creating the clients table.

use async_trait::async_trait;
use sea_orm::sea_query::{ColumnDef, Expr, Index, Table};
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbErr, DeriveIden};

use crate::migration::MigrationUnit;

#[derive(DeriveIden)]
enum Clients {
    Table,
    Id,
    TenantId,
    Name,
    DatabaseName,
    DeletedAt,
    GmtCreate,
    GmtModified,
}

pub struct CreateClients;

#[async_trait]
impl MigrationUnit for CreateClients {
    fn name(&self) -> &'static str {
        "2024_05_01_000003_create_clients"
    }

    async fn apply(&self, tx: &DatabaseTransaction) -> Result<(), DbErr> {
        let backend = tx.get_database_backend();

        let table = Table::create()
            .table(Clients::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Clients::Id)
                    .big_integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(Clients::TenantId).big_integer().not_null())
            .col(ColumnDef::new(Clients::Name).string().not_null())
            .col(ColumnDef::new(Clients::DatabaseName).string_len(64))
            .col(ColumnDef::new(Clients::DeletedAt).timestamp())
            .col(
                ColumnDef::new(Clients::GmtCreate)
                    .timestamp()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(Clients::GmtModified)
                    .timestamp()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .to_owned();
        tx.execute(backend.build(&table)).await?;

        let tenant_index = Index::create()
            .name("idx_clients_tenant")
            .table(Clients::Table)
            .col(Clients::TenantId)
            .to_owned();
        super::create_index(tx, &tenant_index).await?;

        Ok(())
    }
}
